use crate::cli::Config;
use crate::error::{ModupError, Result};
use colored::Colorize;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;

pub mod imports;
pub use imports::{scan_imports, ImportSpan};

/// One package reported by the loader, with every source file belonging to
/// it. Test variants are separate packages and may repeat files.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub import_path: String,
    pub files: Vec<PathBuf>,
}

/// The source-tree loader: enumerates packages under the module root and
/// resolves which module owns an import string.
pub trait PackageLoader {
    /// Every package under the module root, including test-only variants.
    fn load_packages(&self) -> Result<Vec<LoadedPackage>>;

    /// The module path owning an import string. Standard-library imports
    /// resolve to themselves.
    fn owning_module(&self, import_path: &str) -> Result<String>;
}

/// JSON shape of one `go list -e -json` package record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoPackage {
    #[serde(default)]
    dir: String,
    #[serde(default)]
    import_path: String,
    #[serde(default)]
    standard: bool,
    #[serde(default)]
    module: Option<GoPackageModule>,
    #[serde(default)]
    go_files: Vec<String>,
    #[serde(default)]
    cgo_files: Vec<String>,
    #[serde(default)]
    test_go_files: Vec<String>,
    #[serde(default)]
    x_test_go_files: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoPackageModule {
    #[serde(default)]
    path: String,
}

/// `go list`-backed loader, run in the module directory.
pub struct GoPackageLoader {
    config: Config,
}

impl GoPackageLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn run_list(&self, pattern: &str) -> Result<Vec<GoPackage>> {
        if self.config.verbose {
            eprintln!("{} go list -e -json {}", "query:".dimmed(), pattern);
        }

        let output = Command::new("go")
            .current_dir(&self.config.dir)
            .args(["list", "-e", "-json", "-mod=readonly", pattern])
            .output()
            .map_err(|e| ModupError::PackageLoading(format!("failed to run 'go list': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModupError::PackageLoading(format!(
                "'go list' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut packages = Vec::new();
        for item in serde_json::Deserializer::from_str(&stdout).into_iter::<GoPackage>() {
            packages.push(item?);
        }
        Ok(packages)
    }
}

impl PackageLoader for GoPackageLoader {
    fn load_packages(&self) -> Result<Vec<LoadedPackage>> {
        let packages = self.run_list("./...")?;
        if packages.is_empty() {
            return Err(ModupError::PackageLoading(
                "no packages found under the module root".to_string(),
            ));
        }

        Ok(packages
            .into_iter()
            .map(|pkg| {
                let dir = PathBuf::from(&pkg.dir);
                let files = pkg
                    .go_files
                    .iter()
                    .chain(&pkg.cgo_files)
                    .chain(&pkg.test_go_files)
                    .chain(&pkg.x_test_go_files)
                    .map(|name| dir.join(name))
                    .collect();
                LoadedPackage {
                    import_path: pkg.import_path,
                    files,
                }
            })
            .collect())
    }

    fn owning_module(&self, import_path: &str) -> Result<String> {
        let package = self
            .run_list(import_path)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ModupError::PackageLoading(format!("no package info for import {import_path}"))
            })?;

        // Standard library packages don't belong to a module.
        if package.standard {
            return Ok(import_path.to_string());
        }

        match package.module {
            Some(module) if !module.path.is_empty() => Ok(module.path),
            _ => Err(ModupError::PackageLoading(format!(
                "no module path reported for import {import_path}"
            ))),
        }
    }
}
