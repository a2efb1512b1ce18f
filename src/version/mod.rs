use crate::error::{ModupError, Result};
use regex::Regex;

/// A user-supplied upgrade target of any precision: `v2`, `v2.3`, `v2.3.4`
/// or a fully qualified version with a pre-release suffix. Partial forms are
/// only ever used as query specifiers and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    raw: String,
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Option<String>,
}

impl Query {
    pub fn parse(input: &str) -> Result<Self> {
        let re = query_pattern();
        let caps = re
            .captures(input)
            .ok_or_else(|| ModupError::InvalidVersion(input.to_string()))?;

        let major = parse_component(caps.get(1).map(|m| m.as_str()), input)?
            .ok_or_else(|| ModupError::InvalidVersion(input.to_string()))?;
        let minor = parse_component(caps.get(2).map(|m| m.as_str()), input)?;
        let patch = parse_component(caps.get(3).map(|m| m.as_str()), input)?;
        let pre = caps.get(4).map(|m| m.as_str().to_string());

        // Full-precision queries must also be parseable as canonical semver.
        if patch.is_some() {
            parse_canonical(input)?;
        }

        Ok(Self {
            raw: input.to_string(),
            major,
            minor,
            patch,
            pre,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a canonical version satisfies this query, component-wise.
    /// Unlike a raw string-prefix test, `v2` matches `v2.3.4` but not
    /// `v20.1.0`.
    pub fn matches(&self, version: &str) -> bool {
        let Ok(parsed) = parse_canonical(version) else {
            return false;
        };
        if parsed.major != self.major {
            return false;
        }
        if let Some(minor) = self.minor {
            if parsed.minor != minor {
                return false;
            }
        }
        if let Some(patch) = self.patch {
            if parsed.patch != patch {
                return false;
            }
        }
        if let Some(pre) = &self.pre {
            if parsed.pre.as_str() != pre {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn query_pattern() -> Regex {
    Regex::new(
        r"^v(0|[1-9]\d*)(?:\.(0|[1-9]\d*)(?:\.(0|[1-9]\d*)(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?(?:\+[0-9A-Za-z][0-9A-Za-z.-]*)?)?)?$",
    )
    .expect("version query pattern is valid")
}

fn parse_component(raw: Option<&str>, input: &str) -> Result<Option<u64>> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ModupError::InvalidVersion(input.to_string())),
    }
}

/// Parses a canonical `vMAJOR.MINOR.PATCH[-pre][+build]` version as returned
/// by the module index. Accepts the `+incompatible` build suffix used for
/// pre-module major releases.
pub fn parse_canonical(version: &str) -> Result<semver::Version> {
    let stripped = version
        .strip_prefix('v')
        .ok_or_else(|| ModupError::InvalidVersion(version.to_string()))?;
    semver::Version::parse(stripped)
        .map_err(|_| ModupError::InvalidVersion(version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_queries() {
        for raw in ["v2", "v2.3", "v2.3.4", "v0", "v1.0", "v2.3.4-beta.1"] {
            assert!(Query::parse(raw).is_ok(), "{raw} should parse");
        }
        assert_eq!(Query::parse("v2.3").unwrap().major(), 2);
        assert_eq!(Query::parse("v10").unwrap().major(), 10);
    }

    #[test]
    fn rejects_malformed_queries() {
        for raw in ["2.3.4", "v", "va", "v2.", "v2.x", "v02", "v2.03", ""] {
            assert!(Query::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn matches_is_component_wise() {
        let q = Query::parse("v2").unwrap();
        assert!(q.matches("v2.3.4"));
        assert!(q.matches("v2.0.0"));
        assert!(!q.matches("v20.1.0"));
        assert!(!q.matches("v3.0.0"));

        let q = Query::parse("v2.3").unwrap();
        assert!(q.matches("v2.3.9"));
        assert!(!q.matches("v2.4.0"));

        let q = Query::parse("v2.3.4").unwrap();
        assert!(q.matches("v2.3.4"));
        assert!(!q.matches("v2.3.5"));

        let q = Query::parse("v2.3.4-beta.1").unwrap();
        assert!(q.matches("v2.3.4-beta.1"));
        assert!(!q.matches("v2.3.4"));
    }

    #[test]
    fn canonical_accepts_incompatible_suffix() {
        assert!(parse_canonical("v3.2.1+incompatible").is_ok());
        assert!(parse_canonical("v1.2.3-pre").is_ok());
        assert!(parse_canonical("1.2.3").is_err());
        assert!(parse_canonical("v1.2").is_err());
    }
}
