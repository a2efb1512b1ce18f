use crate::cli::Config;
use crate::error::{ModupError, Result};
use crate::loader::{scan_imports, PackageLoader};
use crate::modpath;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A pending (old module path -> new module path) rewrite instruction.
/// Produced once during resolution, consumed once here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRecord {
    pub old_path: String,
    pub new_path: String,
}

/// A modified source file held in memory until the whole tree has been
/// scanned successfully.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Memoized import-string -> owning-module lookups. One instance per run;
/// entries are only ever added, never invalidated.
pub struct ModuleResolutionCache<'a> {
    loader: &'a dyn PackageLoader,
    entries: HashMap<String, String>,
}

impl<'a> ModuleResolutionCache<'a> {
    pub fn new(loader: &'a dyn PackageLoader) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, import_path: &str) -> Result<String> {
        if let Some(hit) = self.entries.get(import_path) {
            return Ok(hit.clone());
        }
        let module = self.loader.owning_module(import_path)?;
        self.entries
            .insert(import_path.to_string(), module.clone());
        Ok(module)
    }
}

/// Rewrites import statements across the loaded source tree. The scan phase
/// is fully speculative; nothing touches disk until `flush`.
pub struct ImportRewriter<'a> {
    loader: &'a dyn PackageLoader,
    config: &'a Config,
}

impl<'a> ImportRewriter<'a> {
    pub fn new(loader: &'a dyn PackageLoader, config: &'a Config) -> Self {
        Self { loader, config }
    }

    /// Visits every file exactly once (test package variants repeat files)
    /// and stages a rewritten copy of each file whose imports changed.
    ///
    /// Matching is by owning module, not by string prefix: upgrading `dep`
    /// to `dep/v5` while `dep/v3` is independently required must not turn a
    /// `dep/v3` import into `dep/v5/v3`. Where the module path ends and the
    /// package sub-path begins is only known to the loader.
    pub fn rewrite_tree(&self, upgrades: &[UpgradeRecord]) -> Result<Vec<StagedFile>> {
        let upgrade_map: HashMap<&str, &str> = upgrades
            .iter()
            .map(|u| (u.old_path.as_str(), u.new_path.as_str()))
            .collect();

        let packages = self.loader.load_packages()?;
        let mut cache = ModuleResolutionCache::new(self.loader);
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut staged = Vec::new();

        for package in &packages {
            if self.config.verbose {
                println!("Package: {}", package.import_path);
            }
            for file in &package.files {
                if !visited.insert(file.clone()) {
                    continue;
                }
                let source = fs::read_to_string(file)?;
                if let Some(content) =
                    self.rewrite_file(file, &source, &upgrade_map, &mut cache)?
                {
                    staged.push(StagedFile {
                        path: file.clone(),
                        content,
                    });
                }
            }
        }
        Ok(staged)
    }

    /// Pure per-file transformation: returns new content only when at least
    /// one import actually changed.
    fn rewrite_file(
        &self,
        path: &Path,
        source: &str,
        upgrade_map: &HashMap<&str, &str>,
        cache: &mut ModuleResolutionCache<'_>,
    ) -> Result<Option<String>> {
        let mut replacements = Vec::new();
        let mut announced = false;

        for span in scan_imports(source) {
            let module_path = cache.resolve(&span.path)?;
            let Some(new_module) = upgrade_map.get(module_path.as_str()) else {
                continue;
            };
            let Some(sub_path) = span.path.strip_prefix(module_path.as_str()) else {
                continue;
            };
            let new_import = format!("{new_module}{sub_path}");
            if new_import == span.path {
                continue;
            }
            modpath::check_import_path(&new_import)
                .map_err(|_| ModupError::InvalidImportAfterRewrite(new_import.clone()))?;

            if self.config.verbose {
                if !announced {
                    announced = true;
                    println!("{}:", path.display());
                }
                println!("\t{} -> {}", span.path, new_import);
            }
            replacements.push((span, new_import));
        }

        if replacements.is_empty() {
            return Ok(None);
        }

        // splice back to front so earlier spans stay valid
        let mut content = source.to_string();
        for (span, new_import) in replacements.iter().rev() {
            content.replace_range(span.start..span.end, new_import);
        }
        Ok(Some(content))
    }

    /// Writes the staged files. Called only after the whole tree was scanned
    /// cleanly; a failure partway leaves earlier files upgraded (multi-file
    /// writes are not atomic as a group).
    pub fn flush(&self, staged: &[StagedFile]) -> Result<()> {
        for file in staged {
            fs::write(&file.path, &file.content).map_err(|e| ModupError::Persistence {
                path: file.path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}
