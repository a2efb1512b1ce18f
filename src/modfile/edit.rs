use crate::error::{ModupError, Result};
use crate::modfile::ModFile;
use crate::version::Query;

/// The net effect of one applied dependency upgrade, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyUpgrade {
    pub old_path: String,
    pub old_version: String,
    pub new_path: String,
    pub new_version: String,
}

/// Applies a dependency upgrade to the requirement list.
///
/// The old requirement is always dropped. If the new path is already
/// required and its version satisfies the user's query, that entry is kept
/// as-is (the resolved version is discarded); a non-matching pre-existing
/// entry is dropped and replaced. With no query (next-available-major mode)
/// any pre-existing entry for the new path is kept.
pub fn apply_dependency_upgrade(
    file: &mut ModFile,
    old_path: &str,
    new_path: &str,
    resolved_version: &str,
    query: Option<&Query>,
) -> Result<DependencyUpgrade> {
    let old = file
        .find_require(old_path)
        .cloned()
        .ok_or_else(|| ModupError::NotADependency(old_path.to_string()))?;

    let mut final_version = resolved_version.to_string();
    let mut keep_existing = false;
    let mut drop_stale = false;

    if new_path != old_path {
        if let Some(existing) = file.find_require(new_path) {
            let matches = query.is_none_or(|q| q.matches(&existing.version));
            if matches {
                keep_existing = true;
                final_version = existing.version.clone();
            } else {
                drop_stale = true;
            }
        }
    }

    file.drop_require(old_path);
    if drop_stale {
        file.drop_require(new_path);
    }
    if !keep_existing {
        file.add_require(new_path, &final_version);
    }

    Ok(DependencyUpgrade {
        old_path: old_path.to_string(),
        old_version: old.version,
        new_path: new_path.to_string(),
        new_version: final_version,
    })
}

/// Rewrites the manifest's own module identity. The requirement list is not
/// touched.
pub fn apply_self_upgrade(file: &mut ModFile, new_own_path: &str) {
    file.set_module(new_own_path);
}
