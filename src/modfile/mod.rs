use crate::error::{ModupError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

mod edit;
pub use edit::{apply_dependency_upgrade, apply_self_upgrade, DependencyUpgrade};

pub const MOD_FILE_NAME: &str = "go.mod";

/// One require directive entry. Paths are unique within a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

/// In-memory go.mod model. Read fully, mutated in memory and rewritten in
/// full (sorted, cleaned) as the final step of an invocation. Directives
/// other than module/go/toolchain/require are preserved verbatim.
#[derive(Debug, Clone)]
pub struct ModFile {
    module_path: String,
    go_version: Option<String>,
    toolchain: Option<String>,
    requires: Vec<Requirement>,
    retained: Vec<String>,
}

impl ModFile {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MOD_FILE_NAME);
        let content = fs::read_to_string(&path).map_err(|e| {
            ModupError::ManifestParsing(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let module_re = directive_pattern(r"^module\s+(\S+)\s*$");
        let go_re = directive_pattern(r"^go\s+(\S+)\s*$");
        let toolchain_re = directive_pattern(r"^toolchain\s+(\S+)\s*$");
        let require_single_re = directive_pattern(r"^require\s+(\S+)\s+(\S+)\s*(//.*)?$");
        let require_entry_re = directive_pattern(r"^(\S+)\s+(\S+)\s*(//.*)?$");
        let block_open_re = directive_pattern(r"^(require|replace|exclude|retract)\s+\(\s*$");

        let mut file = ModFile {
            module_path: String::new(),
            go_version: None,
            toolchain: None,
            requires: Vec::new(),
            retained: Vec::new(),
        };

        let mut block: Option<String> = None;
        for raw_line in content.lines() {
            let line = raw_line.trim();

            if let Some(kind) = &block {
                if line == ")" {
                    if kind != "require" {
                        file.retained.push(raw_line.to_string());
                    }
                    block = None;
                } else if kind == "require" {
                    if line.is_empty() || line.starts_with("//") {
                        continue;
                    }
                    let caps = require_entry_re.captures(line).ok_or_else(|| {
                        ModupError::ManifestParsing(format!("malformed require entry: {line}"))
                    })?;
                    file.push_requirement(requirement_from_captures(&caps))?;
                } else {
                    file.retained.push(raw_line.to_string());
                }
                continue;
            }

            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(caps) = module_re.captures(line) {
                if !file.module_path.is_empty() {
                    return Err(ModupError::ManifestParsing(
                        "duplicate module directive".to_string(),
                    ));
                }
                file.module_path = caps[1].to_string();
            } else if let Some(caps) = go_re.captures(line) {
                file.go_version = Some(caps[1].to_string());
            } else if let Some(caps) = toolchain_re.captures(line) {
                file.toolchain = Some(caps[1].to_string());
            } else if let Some(caps) = block_open_re.captures(line) {
                let kind = caps[1].to_string();
                if kind != "require" {
                    file.retained.push(raw_line.to_string());
                }
                block = Some(kind);
            } else if let Some(caps) = require_single_re.captures(line) {
                file.push_requirement(requirement_from_captures(&caps))?;
            } else {
                // replace/exclude/retract single-line directives and anything
                // this tool does not edit
                file.retained.push(raw_line.to_string());
            }
        }

        if block.is_some() {
            return Err(ModupError::ManifestParsing(
                "unterminated directive block".to_string(),
            ));
        }
        if file.module_path.is_empty() {
            return Err(ModupError::ManifestParsing(
                "missing module directive".to_string(),
            ));
        }
        Ok(file)
    }

    /// Serializes the manifest: module first, then go/toolchain, one sorted
    /// require block, then retained directives.
    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("module {}\n", self.module_path));
        if let Some(go) = &self.go_version {
            out.push_str(&format!("\ngo {go}\n"));
        }
        if let Some(toolchain) = &self.toolchain {
            out.push_str(&format!("\ntoolchain {toolchain}\n"));
        }

        let mut requires = self.requires.clone();
        requires.sort_by(|a, b| a.path.cmp(&b.path));
        match requires.len() {
            0 => {}
            1 => {
                let entry = &requires[0];
                out.push_str(&format!("\nrequire {}\n", format_requirement(entry)));
            }
            _ => {
                out.push_str("\nrequire (\n");
                for entry in &requires {
                    out.push_str(&format!("\t{}\n", format_requirement(entry)));
                }
                out.push_str(")\n");
            }
        }

        if !self.retained.is_empty() {
            out.push('\n');
            for line in &self.retained {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MOD_FILE_NAME);
        fs::write(&path, self.format()).map_err(|e| ModupError::Persistence {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn requires(&self) -> &[Requirement] {
        &self.requires
    }

    pub fn find_require(&self, path: &str) -> Option<&Requirement> {
        self.requires.iter().find(|r| r.path == path)
    }

    pub fn set_module(&mut self, path: &str) {
        self.module_path = path.to_string();
    }

    /// Adds a direct requirement, replacing any existing entry for the path.
    pub fn add_require(&mut self, path: &str, version: &str) {
        if let Some(existing) = self.requires.iter_mut().find(|r| r.path == path) {
            existing.version = version.to_string();
            existing.indirect = false;
            return;
        }
        self.requires.push(Requirement {
            path: path.to_string(),
            version: version.to_string(),
            indirect: false,
        });
    }

    pub fn drop_require(&mut self, path: &str) {
        self.requires.retain(|r| r.path != path);
    }

    fn push_requirement(&mut self, requirement: Requirement) -> Result<()> {
        if self.find_require(&requirement.path).is_some() {
            return Err(ModupError::ManifestParsing(format!(
                "duplicate requirement for {}",
                requirement.path
            )));
        }
        self.requires.push(requirement);
        Ok(())
    }
}

fn directive_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("directive pattern is valid")
}

fn requirement_from_captures(caps: &regex::Captures<'_>) -> Requirement {
    let indirect = caps
        .get(3)
        .is_some_and(|c| c.as_str().trim_start_matches('/').trim().starts_with("indirect"));
    Requirement {
        path: caps[1].to_string(),
        version: caps[2].to_string(),
        indirect,
    }
}

fn format_requirement(entry: &Requirement) -> String {
    if entry.indirect {
        format!("{} {} // indirect", entry.path, entry.version)
    } else {
        format!("{} {}", entry.path, entry.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
module example.com/app

go 1.22

require (
\texample.com/dep v1.2.3
\texample.com/other/v2 v2.0.1 // indirect
)

replace example.com/dep => ../dep
";

    #[test]
    fn parses_module_and_requirements() {
        let file = ModFile::parse(SAMPLE).unwrap();
        assert_eq!(file.module_path(), "example.com/app");
        assert_eq!(file.requires().len(), 2);
        assert_eq!(
            file.find_require("example.com/dep"),
            Some(&Requirement {
                path: "example.com/dep".to_string(),
                version: "v1.2.3".to_string(),
                indirect: false,
            })
        );
        assert!(file.find_require("example.com/other/v2").unwrap().indirect);
    }

    #[test]
    fn parses_single_line_require() {
        let file = ModFile::parse("module example.com/app\n\nrequire example.com/dep v1.0.0\n")
            .unwrap();
        assert_eq!(file.requires().len(), 1);
    }

    #[test]
    fn rejects_duplicate_requirements() {
        let content = "module example.com/app\nrequire example.com/dep v1.0.0\nrequire example.com/dep v1.1.0\n";
        assert!(matches!(
            ModFile::parse(content),
            Err(ModupError::ManifestParsing(_))
        ));
    }

    #[test]
    fn rejects_missing_module_directive() {
        assert!(matches!(
            ModFile::parse("require example.com/dep v1.0.0\n"),
            Err(ModupError::ManifestParsing(_))
        ));
    }

    #[test]
    fn format_sorts_and_cleans() {
        let mut file = ModFile::parse(SAMPLE).unwrap();
        file.add_require("example.com/aaa", "v0.4.0");
        let out = file.format();
        let aaa = out.find("example.com/aaa").unwrap();
        let dep = out.find("example.com/dep v1.2.3").unwrap();
        let other = out.find("example.com/other/v2").unwrap();
        assert!(aaa < dep && dep < other);
        assert!(out.contains("// indirect"));
        assert!(out.contains("replace example.com/dep => ../dep"));
        assert!(out.starts_with("module example.com/app\n"));
    }

    #[test]
    fn round_trips_through_format() {
        let file = ModFile::parse(SAMPLE).unwrap();
        let reparsed = ModFile::parse(&file.format()).unwrap();
        assert_eq!(reparsed.module_path(), file.module_path());
        assert_eq!(reparsed.requires(), file.requires());
    }

    #[test]
    fn single_requirement_formats_without_block() {
        let file = ModFile::parse("module example.com/app\nrequire example.com/dep v1.0.0\n")
            .unwrap();
        assert!(file.format().contains("require example.com/dep v1.0.0"));
    }

    #[test]
    fn add_require_replaces_existing_entry() {
        let mut file = ModFile::parse(SAMPLE).unwrap();
        file.add_require("example.com/dep", "v1.9.0");
        assert_eq!(file.requires().len(), 2);
        assert_eq!(
            file.find_require("example.com/dep").unwrap().version,
            "v1.9.0"
        );
    }
}
