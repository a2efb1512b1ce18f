use crate::cli::Config;
use crate::error::{ModupError, Result};
use crate::index::{QueryError, QueryResult, VersionIndex};
use colored::Colorize;
use serde::Deserialize;
use std::process::Command;

/// JSON shape of one `go list -m -e -json` record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoModule {
    #[serde(default)]
    #[allow(dead_code)]
    path: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    update: Option<GoModuleUpdate>,
    #[serde(default)]
    error: Option<GoModuleError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoModuleUpdate {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoModuleError {
    #[serde(rename = "Err", default)]
    err: String,
}

/// Module index client backed by the `go list -m` subprocess. Queries run in
/// the module directory so the local go.mod provides resolution context.
pub struct GoListIndex {
    config: Config,
}

impl GoListIndex {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn run_list(&self, extra_flags: &[&str], specs: &[String]) -> Result<Vec<GoModule>> {
        if self.config.verbose {
            eprintln!(
                "{} go list -m -e -json {} {}",
                "query:".dimmed(),
                extra_flags.join(" "),
                specs.join(" ")
            );
        }

        let output = Command::new("go")
            .current_dir(&self.config.dir)
            .args(["list", "-m", "-e", "-json", "-mod=readonly"])
            .args(extra_flags)
            .args(specs)
            .output()
            .map_err(|e| ModupError::QueryFailure(format!("failed to run 'go list': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModupError::QueryFailure(format!(
                "'go list' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut modules = Vec::new();
        for item in serde_json::Deserializer::from_str(&stdout).into_iter::<GoModule>() {
            modules.push(item?);
        }
        Ok(modules)
    }
}

impl VersionIndex for GoListIndex {
    fn query(&self, specs: &[String]) -> Result<Vec<QueryResult>> {
        let modules = self.run_list(&[], specs)?;
        if modules.len() != specs.len() {
            return Err(ModupError::QueryFailure(format!(
                "'go list' returned {} results for {} queries",
                modules.len(),
                specs.len()
            )));
        }
        Ok(specs
            .iter()
            .zip(modules)
            .map(|(spec, module)| to_result(spec, module))
            .collect())
    }

    fn query_with_update(&self, spec: &str) -> Result<QueryResult> {
        let specs = [spec.to_string()];
        let modules = self.run_list(&["-u"], &specs)?;
        let module = modules.into_iter().next().ok_or_else(|| {
            ModupError::QueryFailure(format!("'go list' returned no result for {spec}"))
        })?;
        Ok(to_result(spec, module))
    }
}

fn to_result(spec: &str, module: GoModule) -> QueryResult {
    let error = module
        .error
        .filter(|e| !e.err.is_empty())
        .map(|e| classify(&e.err));
    QueryResult {
        spec: spec.to_string(),
        version: module.version.filter(|v| !v.is_empty()),
        update: module.update.and_then(|u| u.version),
        error,
    }
}

/// Maps the index's human-readable per-module error text onto the structured
/// classification. This is the only place in the crate that inspects error
/// text; everything downstream matches on the variants.
fn classify(message: &str) -> QueryError {
    const NOT_FOUND: &[&str] = &[
        "no matching versions",
        "unknown revision",
        "not found",
        "404",
        "410",
    ];
    const INVALID: &[&str] = &["malformed module path", "invalid module path", "invalid version syntax"];

    let lower = message.to_ascii_lowercase();
    if NOT_FOUND.iter().any(|needle| lower.contains(needle)) {
        return QueryError::NotFound(message.to_string());
    }
    if INVALID.iter().any(|needle| lower.contains(needle)) {
        return QueryError::Invalid(message.to_string());
    }
    QueryError::Transient(message.to_string())
}
