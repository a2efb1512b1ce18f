use crate::cli::Config;
use crate::error::{ModupError, Result};
use crate::index::IndexFactory;
use crate::loader::GoPackageLoader;
use crate::modfile::{self, ModFile, Requirement};
use crate::modpath;
use crate::resolve::VersionResolver;
use crate::rewrite::{ImportRewriter, UpgradeRecord};
use crate::version::{self, Query};
use colored::Colorize;
use crossbeam_channel::unbounded;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use threadpool::ThreadPool;

/// Upper bound on concurrent index resolutions during a bulk upgrade.
const BULK_WORKERS: usize = 8;

/// Entry point: reads the manifest once and selects the flow. `module`
/// omitted or equal to the module's own path upgrades the module itself;
/// the special target "all" upgrades every direct dependency; anything else
/// upgrades a single dependency.
pub fn execute(config: &Config, module: Option<&str>, version_arg: Option<&str>) -> Result<()> {
    let file = ModFile::read(&config.dir)?;

    match module {
        None => upgrade_module(config, file, version_arg),
        Some(path) if path == file.module_path() => upgrade_module(config, file, version_arg),
        Some("all") => upgrade_all(config, file),
        Some(path) => upgrade_dependency(config, file, path, version_arg),
    }
}

/// Upgrades the module's own identity: bumps the major component of its path
/// (next sequential, or the major of an explicit target) and rewrites the
/// imports between its own packages.
fn upgrade_module(config: &Config, mut file: ModFile, version_arg: Option<&str>) -> Result<()> {
    let old_path = file.module_path().to_string();

    // Only the major component of an explicit target matters here.
    let target_major = match version_arg {
        Some(raw) => Some(Query::parse(raw)?.major()),
        None => None,
    };

    let new_path = modpath::upgrade_path(&old_path, target_major)?;
    println!("{} -> {}", old_path, new_path.green());

    modfile::apply_self_upgrade(&mut file, &new_path);
    let records = vec![UpgradeRecord {
        old_path,
        new_path,
    }];
    rewrite_and_persist(config, &file, &records)
}

/// Upgrades a single dependency to an explicit version, or to the highest
/// available major when none is given.
fn upgrade_dependency(
    config: &Config,
    mut file: ModFile,
    path: &str,
    version_arg: Option<&str>,
) -> Result<()> {
    modpath::check_path(path)?;

    let index = IndexFactory::create_go_list(config.clone());
    let resolver = VersionResolver::new(index, config.verbose);

    let (new_path, resolved_version, query) = match version_arg {
        None => {
            let full = resolver
                .next_available_major(path)?
                .ok_or(ModupError::NoUpgradeAvailable)?;
            let major = version::parse_canonical(&full)?.major;
            (modpath::upgrade_path(path, Some(major))?, full, None)
        }
        Some(raw) => {
            let query = Query::parse(raw)?;
            let (new_path, full) = resolver.resolve_target(path, &query)?;
            (new_path, full, Some(query))
        }
    };

    let edit =
        modfile::apply_dependency_upgrade(&mut file, path, &new_path, &resolved_version, query.as_ref())?;
    println!(
        "{} {} -> {} {}",
        edit.old_path,
        edit.old_version.red(),
        edit.new_path,
        edit.new_version.green()
    );

    // Paths can be identical for a minor/patch-only update; no imports to
    // rewrite then.
    let records = vec![UpgradeRecord {
        old_path: path.to_string(),
        new_path,
    }];
    rewrite_and_persist(config, &file, &records)
}

/// Upgrades every direct dependency to its highest available major.
/// Resolution queries fan out over a bounded worker pool; manifest edits are
/// applied sequentially, in manifest order, to preserve the uniqueness
/// invariant on requirement paths.
fn upgrade_all(config: &Config, mut file: ModFile) -> Result<()> {
    let direct: Vec<Requirement> = file
        .requires()
        .iter()
        .filter(|r| !r.indirect)
        .cloned()
        .collect();

    if direct.is_empty() {
        println!("{}", "no direct dependencies to upgrade".yellow());
        return file.write(&config.dir);
    }

    let outcomes = resolve_all(config, &direct);

    let mut records: Vec<UpgradeRecord> = Vec::new();
    let mut claimed_targets: HashMap<String, String> = HashMap::new();

    for (req, outcome) in direct.iter().zip(outcomes) {
        let resolved = match outcome {
            None => {
                return Err(ModupError::QueryFailure(format!(
                    "resolution worker for {} died",
                    req.path
                )));
            }
            Some(result) => result?,
        };
        let Some(full_version) = resolved else {
            if config.verbose {
                println!("{} - no versions available for upgrade", req.path);
            }
            continue;
        };

        let major = version::parse_canonical(&full_version)?.major;
        let new_path = modpath::upgrade_path(&req.path, Some(major))?;

        // Two requirements collapsing onto one target would break the path
        // uniqueness invariant; surface it instead of guessing which wins.
        if let Some(previous) = claimed_targets.get(&new_path) {
            return Err(ModupError::ConflictingUpgradeTargets {
                first: previous.clone(),
                second: req.path.clone(),
                target: new_path,
            });
        }
        claimed_targets.insert(new_path.clone(), req.path.clone());

        let edit =
            modfile::apply_dependency_upgrade(&mut file, &req.path, &new_path, &full_version, None)?;
        println!(
            "{} {} -> {} {}",
            edit.old_path,
            edit.old_version.red(),
            edit.new_path,
            edit.new_version.green()
        );
        records.push(UpgradeRecord {
            old_path: req.path.clone(),
            new_path,
        });
    }

    rewrite_and_persist(config, &file, &records)
}

type ResolutionOutcome = Option<Result<Option<String>>>;

/// Fan-out/fan-in: one boundary search per requirement, bounded by the
/// worker pool, results collected back into manifest order.
fn resolve_all(config: &Config, direct: &[Requirement]) -> Vec<ResolutionOutcome> {
    let index = IndexFactory::create_go_list(config.clone());
    let pool = ThreadPool::new(BULK_WORKERS.min(direct.len()));
    let (tx, rx) = unbounded();

    for (slot, req) in direct.iter().enumerate() {
        let tx = tx.clone();
        let index = Arc::clone(&index);
        let path = req.path.clone();
        let verbose = config.verbose;
        pool.execute(move || {
            let resolver = VersionResolver::new(index, verbose);
            let outcome = resolver.next_available_major(&path);
            let _ = tx.send((slot, outcome));
        });
    }
    drop(tx);

    let bar = ProgressBar::new(direct.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:40}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut outcomes: Vec<ResolutionOutcome> = (0..direct.len()).map(|_| None).collect();
    for (slot, outcome) in rx {
        bar.set_message(direct[slot].path.clone());
        bar.inc(1);
        outcomes[slot] = Some(outcome);
    }
    bar.finish_and_clear();
    outcomes
}

/// Rewrites the source tree for the given records, then persists go.mod.
/// Source files are staged before anything is flushed; the manifest write is
/// the final step so it stays untouched on any earlier failure.
fn rewrite_and_persist(config: &Config, file: &ModFile, records: &[UpgradeRecord]) -> Result<()> {
    let actionable: Vec<UpgradeRecord> = records
        .iter()
        .filter(|r| r.old_path != r.new_path)
        .cloned()
        .collect();

    if !actionable.is_empty() {
        let loader = GoPackageLoader::new(config.clone());
        let rewriter = ImportRewriter::new(&loader, config);
        let staged = rewriter.rewrite_tree(&actionable)?;
        rewriter.flush(&staged)?;
    }

    file.write(&config.dir)
}
