use crate::error::{ModupError, Result};
use crate::index::{QueryError, QueryResult, VersionIndex};
use crate::modpath;
use crate::version::{self, Query};
use colored::Colorize;
use std::sync::Arc;

/// Probes per index round-trip. Larger batches mean fewer round-trips but
/// more wasted probes past the boundary.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Lazily yields consecutive major-version existence probes for a module
/// prefix: `prefix/vN@vN`, `prefix/vN+1@vN+1`, ... Restartable only by
/// constructing a new generator.
#[derive(Debug)]
pub struct MajorCandidates {
    prefix: String,
    next: u64,
}

impl MajorCandidates {
    pub fn new(prefix: &str, start: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: start,
        }
    }

    pub fn next_batch(&mut self, size: usize) -> Vec<(u64, String)> {
        (0..size)
            .map(|_| {
                let major = self.next;
                self.next += 1;
                (major, format!("{0}/v{1}@v{1}", self.prefix, major))
            })
            .collect()
    }
}

/// Drives the module index to resolve upgrade targets: either the highest
/// contiguous existing major above the current one, or an explicit
/// (possibly partial) version query.
pub struct VersionResolver {
    index: Arc<dyn VersionIndex>,
    batch_size: usize,
    verbose: bool,
}

impl VersionResolver {
    pub fn new(index: Arc<dyn VersionIndex>, verbose: bool) -> Self {
        Self::with_batch_size(index, verbose, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(index: Arc<dyn VersionIndex>, verbose: bool, batch_size: usize) -> Self {
        Self {
            index,
            batch_size: batch_size.max(1),
            verbose,
        }
    }

    /// Searches for the highest contiguous major version published above the
    /// current one and returns its resolved version, or `None` when no
    /// higher major exists. Probes are issued in fixed-size batches; the
    /// first not-found terminates the search. Transient index errors are
    /// skipped mid-scan, but a transient on the very first probe, or a whole
    /// batch of consecutive transients, aborts the search.
    pub fn next_available_major(&self, path: &str) -> Result<Option<String>> {
        let (prefix, current_major) = modpath::split_path_version(path)?;

        let start = match current_major {
            Some(major) => major + 1,
            None => {
                // No suffix yet: derive the start point from the highest
                // available minor/patch update so legacy pre-major and
                // incompatible releases are skipped over.
                let base = self.minor_update_version(path)?;
                (version::parse_canonical(&base)?.major + 1).max(2)
            }
        };

        let mut candidates = MajorCandidates::new(prefix, start);
        let mut last_good: Option<String> = None;
        let mut probes_seen = 0usize;
        let mut transient_streak = 0usize;

        loop {
            let batch = candidates.next_batch(self.batch_size);
            let specs: Vec<String> = batch.into_iter().map(|(_, spec)| spec).collect();
            let results = self.index.query(&specs)?;

            for result in results {
                probes_seen += 1;
                match &result.error {
                    None => {
                        let Some(found) = result.version.clone() else {
                            return Err(ModupError::QueryFailure(format!(
                                "index returned no version for {}",
                                result.spec
                            )));
                        };
                        transient_streak = 0;
                        last_good = Some(found);
                    }
                    Some(QueryError::NotFound(msg)) => {
                        if self.verbose {
                            eprintln!("{} {}", "boundary:".dimmed(), msg);
                        }
                        return Ok(last_good);
                    }
                    Some(QueryError::Invalid(msg)) => {
                        return Err(ModupError::QueryFailure(format!(
                            "probe {} rejected: {}",
                            result.spec, msg
                        )));
                    }
                    Some(QueryError::Transient(msg)) => {
                        if probes_seen == 1 {
                            return Err(ModupError::QueryFailure(format!(
                                "probe {} failed: {}",
                                result.spec, msg
                            )));
                        }
                        transient_streak += 1;
                        if transient_streak >= self.batch_size {
                            return Err(ModupError::QueryFailure(format!(
                                "probe {} failed after {} consecutive errors: {}",
                                result.spec, transient_streak, msg
                            )));
                        }
                        if self.verbose {
                            eprintln!("{} {}", "skipping:".dimmed(), msg);
                        }
                    }
                }
            }
        }
    }

    /// Resolves an explicit (possibly partial) target version to the final
    /// module path and canonical version: the version-suffixed candidate
    /// path is probed first, then the bare prefix for majors published under
    /// the legacy pre-module (incompatible) convention.
    pub fn resolve_target(&self, path: &str, query: &Query) -> Result<(String, String)> {
        let new_path = modpath::upgrade_path(path, Some(query.major()))?;

        let result = self.single(&format!("{new_path}@{query}"))?;
        match result.error {
            None => {
                let resolved = expect_version(&result)?;
                return Ok((new_path, resolved));
            }
            Some(QueryError::NotFound(msg)) => {
                if self.verbose {
                    eprintln!("{} {}", "fallback:".dimmed(), msg);
                }
            }
            Some(err) => return Err(ModupError::QueryFailure(err.message().to_string())),
        }

        let (prefix, _) = modpath::split_path_version(path)?;
        let result = self.single(&format!("{prefix}@{query}"))?;
        match result.error {
            None => {
                let resolved = expect_version(&result)?;
                Ok((prefix.to_string(), resolved))
            }
            Some(QueryError::NotFound(_)) => Err(ModupError::VersionNotFound {
                path: path.to_string(),
                version: query.as_str().to_string(),
            }),
            Some(err) => Err(ModupError::QueryFailure(err.message().to_string())),
        }
    }

    /// Highest available minor/patch update for an unsuffixed path, falling
    /// back to the currently resolved version when none is pending.
    fn minor_update_version(&self, path: &str) -> Result<String> {
        let result = self.index.query_with_update(path)?;
        if let Some(err) = result.error {
            return Err(ModupError::QueryFailure(format!(
                "cannot resolve {}: {}",
                path,
                err.message()
            )));
        }
        let base = match result.update {
            Some(update) => update,
            None => expect_version(&result)?,
        };
        version::parse_canonical(&base)?;
        Ok(base)
    }

    fn single(&self, spec: &str) -> Result<QueryResult> {
        self.index
            .query(std::slice::from_ref(&spec.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ModupError::QueryFailure(format!("no result for {spec}")))
    }
}

fn expect_version(result: &QueryResult) -> Result<String> {
    result.version.clone().ok_or_else(|| {
        ModupError::QueryFailure(format!("index returned no version for {}", result.spec))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted index: maps a spec to its result, counts batch calls.
    struct FakeIndex {
        responses: HashMap<String, QueryResult>,
        batches: Mutex<usize>,
    }

    impl FakeIndex {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                batches: Mutex::new(0),
            }
        }

        fn ok(mut self, spec: &str, ver: &str) -> Self {
            self.responses.insert(
                spec.to_string(),
                QueryResult {
                    spec: spec.to_string(),
                    version: Some(ver.to_string()),
                    update: None,
                    error: None,
                },
            );
            self
        }

        fn with_update(mut self, spec: &str, ver: &str, update: Option<&str>) -> Self {
            self.responses.insert(
                spec.to_string(),
                QueryResult {
                    spec: spec.to_string(),
                    version: Some(ver.to_string()),
                    update: update.map(str::to_string),
                    error: None,
                },
            );
            self
        }

        fn err(mut self, spec: &str, error: QueryError) -> Self {
            self.responses.insert(
                spec.to_string(),
                QueryResult {
                    spec: spec.to_string(),
                    version: None,
                    update: None,
                    error: Some(error),
                },
            );
            self
        }

        fn batch_count(&self) -> usize {
            *self.batches.lock().unwrap()
        }

        fn lookup(&self, spec: &str) -> QueryResult {
            self.responses.get(spec).cloned().unwrap_or(QueryResult {
                spec: spec.to_string(),
                version: None,
                update: None,
                error: Some(QueryError::NotFound(format!(
                    "no matching versions for {spec}"
                ))),
            })
        }
    }

    impl VersionIndex for FakeIndex {
        fn query(&self, specs: &[String]) -> Result<Vec<QueryResult>> {
            *self.batches.lock().unwrap() += 1;
            Ok(specs.iter().map(|s| self.lookup(s)).collect())
        }

        fn query_with_update(&self, spec: &str) -> Result<QueryResult> {
            Ok(self.lookup(spec))
        }
    }

    fn resolver(index: FakeIndex, batch: usize) -> (Arc<FakeIndex>, VersionResolver) {
        let index = Arc::new(index);
        let shared: Arc<dyn VersionIndex> = index.clone();
        let resolver = VersionResolver::with_batch_size(shared, false, batch);
        (index, resolver)
    }

    fn majors_exist(from: u64, to: u64) -> FakeIndex {
        let mut index = FakeIndex::new().with_update("example.com/dep", "v1.0.0", None);
        for major in from..=to {
            index = index.ok(
                &format!("example.com/dep/v{major}@v{major}"),
                &format!("v{major}.1.0"),
            );
        }
        index
    }

    #[test]
    fn boundary_search_returns_last_contiguous_major() {
        let (index, resolver) = resolver(majors_exist(2, 7), 5);
        let found = resolver.next_available_major("example.com/dep").unwrap();
        assert_eq!(found.as_deref(), Some("v7.1.0"));
        // majors 2..7 good, 8 not found: probes 2-6, then 7-11 -> two batches
        assert_eq!(index.batch_count(), 2);
    }

    #[test]
    fn boundary_search_respects_batch_size() {
        let (index, resolver) = resolver(majors_exist(2, 7), 25);
        let found = resolver.next_available_major("example.com/dep").unwrap();
        assert_eq!(found.as_deref(), Some("v7.1.0"));
        assert_eq!(index.batch_count(), 1);
    }

    #[test]
    fn boundary_search_starts_above_current_suffix() {
        let index = FakeIndex::new()
            .ok("example.com/dep/v4@v4", "v4.0.3")
            .ok("example.com/dep/v5@v5", "v5.2.0");
        let (_, resolver) = resolver(index, 5);
        let found = resolver.next_available_major("example.com/dep/v3").unwrap();
        assert_eq!(found.as_deref(), Some("v5.2.0"));
    }

    #[test]
    fn no_higher_major_yields_none() {
        let index = FakeIndex::new().with_update("example.com/dep", "v1.0.0", None);
        let (_, resolver) = resolver(index, 5);
        let found = resolver.next_available_major("example.com/dep").unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn unsuffixed_start_point_skips_legacy_majors() {
        // current release line is v3.x incompatible; search must begin at v4
        let index = FakeIndex::new()
            .with_update("example.com/dep", "v1.4.0", Some("v3.2.1+incompatible"))
            .ok("example.com/dep/v4@v4", "v4.0.0")
            .err(
                "example.com/dep/v2@v2",
                QueryError::Transient("should never be probed".into()),
            );
        let (_, resolver) = resolver(index, 5);
        let found = resolver.next_available_major("example.com/dep").unwrap();
        assert_eq!(found.as_deref(), Some("v4.0.0"));
    }

    #[test]
    fn transient_mid_scan_does_not_terminate() {
        let index = FakeIndex::new()
            .with_update("example.com/dep", "v1.0.0", None)
            .ok("example.com/dep/v2@v2", "v2.0.0")
            .err(
                "example.com/dep/v3@v3",
                QueryError::Transient("proxy timeout".into()),
            )
            .ok("example.com/dep/v4@v4", "v4.3.0");
        let (_, resolver) = resolver(index, 5);
        let found = resolver.next_available_major("example.com/dep").unwrap();
        assert_eq!(found.as_deref(), Some("v4.3.0"));
    }

    #[test]
    fn transient_on_first_probe_is_fatal() {
        let index = FakeIndex::new().err(
            "example.com/dep/v4@v4",
            QueryError::Transient("proxy down".into()),
        );
        let (_, resolver) = resolver(index, 5);
        let err = resolver
            .next_available_major("example.com/dep/v3")
            .unwrap_err();
        assert!(matches!(err, ModupError::QueryFailure(_)));
    }

    #[test]
    fn sustained_transient_failure_is_fatal() {
        let mut index = FakeIndex::new()
            .with_update("example.com/dep", "v1.0.0", None)
            .ok("example.com/dep/v2@v2", "v2.0.0");
        for major in 3..40 {
            index = index.err(
                &format!("example.com/dep/v{major}@v{major}"),
                QueryError::Transient("proxy down".into()),
            );
        }
        let (fake, resolver) = resolver(index, 5);
        let err = resolver.next_available_major("example.com/dep").unwrap_err();
        assert!(matches!(err, ModupError::QueryFailure(_)));
        // terminates after a single batch of consecutive failures, not 40
        assert!(fake.batch_count() <= 3);
    }

    #[test]
    fn resolve_target_prefers_suffixed_path() {
        let index = FakeIndex::new().ok("example.com/dep/v5@v5", "v5.4.0");
        let (_, resolver) = resolver(index, 5);
        let query = Query::parse("v5").unwrap();
        let (path, ver) = resolver.resolve_target("example.com/dep", &query).unwrap();
        assert_eq!(path, "example.com/dep/v5");
        assert_eq!(ver, "v5.4.0");
    }

    #[test]
    fn resolve_target_falls_back_to_incompatible_path() {
        let index = FakeIndex::new().ok("example.com/dep@v5", "v5.0.0+incompatible");
        let (_, resolver) = resolver(index, 5);
        let query = Query::parse("v5").unwrap();
        let (path, ver) = resolver.resolve_target("example.com/dep", &query).unwrap();
        assert_eq!(path, "example.com/dep");
        assert_eq!(ver, "v5.0.0+incompatible");
    }

    #[test]
    fn resolve_target_reports_version_not_found() {
        let (_, resolver) = resolver(FakeIndex::new(), 5);
        let query = Query::parse("v9").unwrap();
        let err = resolver
            .resolve_target("example.com/dep", &query)
            .unwrap_err();
        assert!(matches!(err, ModupError::VersionNotFound { .. }));
    }

    #[test]
    fn resolve_target_surfaces_transport_errors() {
        let index = FakeIndex::new().err(
            "example.com/dep/v5@v5",
            QueryError::Transient("tls handshake failed".into()),
        );
        let (_, resolver) = resolver(index, 5);
        let query = Query::parse("v5").unwrap();
        let err = resolver
            .resolve_target("example.com/dep", &query)
            .unwrap_err();
        assert!(matches!(err, ModupError::QueryFailure(_)));
    }
}
