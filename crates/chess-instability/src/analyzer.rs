//! Position instability analysis.
//!
//! [`InstabilityAnalyzer`] validates the request, consults the sample
//! cache, drives an engine for missing samples, persists the result,
//! and aggregates the swings into one score.

use std::thread;
use std::time::Duration;

use uci_client::engine::{Engine, EngineFactory};
use uci_client::{validate_fen, Evaluation, Score, SearchLimits, UciEngineFactory};

use crate::cache::{CacheError, MemoryCache, SampleCache, SqliteCache};
use crate::config::{AnalyzerConfig, MatePolicy};
use crate::error::InstabilityError;
use crate::metric::mean_absolute_swing;

/// Scores how volatile a position's evaluation is across repeated
/// engine samples.
///
/// Engine and cache are injected, so the same analyzer code runs against
/// a live Stockfish process or deterministic doubles.
pub struct InstabilityAnalyzer {
    config: AnalyzerConfig,
    engines: Box<dyn EngineFactory>,
    cache: Box<dyn SampleCache>,
}

impl InstabilityAnalyzer {
    /// Analyzer over explicitly provided engine factory and cache.
    pub fn new(
        config: AnalyzerConfig,
        engines: Box<dyn EngineFactory>,
        cache: Box<dyn SampleCache>,
    ) -> Self {
        Self {
            config,
            engines,
            cache,
        }
    }

    /// Analyzer wired from configuration: a process-backed engine at
    /// `engine_path`, and the SQLite cache at `cache_path` (in-memory
    /// when no path is configured).
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, InstabilityError> {
        let engines = Box::new(UciEngineFactory::new(config.engine_path.clone()));
        let cache: Box<dyn SampleCache> = match &config.cache_path {
            Some(path) => Box::new(SqliteCache::open(path)?),
            None => Box::new(MemoryCache::new()),
        };
        Ok(Self::new(config, engines, cache))
    }

    /// Computes the instability score for one position.
    ///
    /// Validation runs before any engine or cache access: an empty FEN,
    /// out-of-range `depth`/`n`, and an illegal position are all
    /// rejected without I/O. A cache hit skips the engine entirely and
    /// aggregates the stored values as-is, even when the entry is
    /// shorter than `n`.
    pub fn analyse_instability(
        &self,
        fen: &str,
        depth: u32,
        n: u32,
    ) -> Result<f64, InstabilityError> {
        if fen.trim().is_empty() {
            return Err(InstabilityError::EmptyFen);
        }
        self.validate_parameters(depth, n)?;
        validate_fen(fen)?;

        if let Some(values) = self.with_retries(|| self.cache.get(fen, depth, n))? {
            tracing::debug!(depth, n, "cache hit, skipping engine");
            return Ok(mean_absolute_swing(&values));
        }

        tracing::debug!(depth, n, "cache miss, sampling engine");
        let samples = self.collect_samples(fen, depth, n)?;
        self.with_retries(|| self.cache.set(fen, depth, n, &samples))?;

        Ok(mean_absolute_swing(&samples))
    }

    fn validate_parameters(&self, depth: u32, n: u32) -> Result<(), InstabilityError> {
        if depth == 0 || depth > self.config.max_depth {
            return Err(InstabilityError::Parameter(format!(
                "depth must be in 1..={}, got {}",
                self.config.max_depth, depth
            )));
        }
        if n == 0 || n > self.config.max_samples {
            return Err(InstabilityError::Parameter(format!(
                "sample count must be in 1..={}, got {}",
                self.config.max_samples, n
            )));
        }
        Ok(())
    }

    /// Acquires one engine, samples, and releases the engine on every
    /// exit path, error paths included.
    fn collect_samples(
        &self,
        fen: &str,
        depth: u32,
        n: u32,
    ) -> Result<Vec<f64>, InstabilityError> {
        let mut engine = self.engines.create()?;
        let result = self.sample_loop(engine.as_mut(), fen, depth, n);
        engine.close();
        result
    }

    fn sample_loop(
        &self,
        engine: &mut dyn Engine,
        fen: &str,
        depth: u32,
        n: u32,
    ) -> Result<Vec<f64>, InstabilityError> {
        let limits = SearchLimits::depth(depth);
        let mut samples = Vec::with_capacity(n as usize);
        for _ in 0..n {
            match engine.analyse(fen, limits)? {
                Some(eval) => {
                    if let Some(score) = self.sample_score(&eval) {
                        samples.push(score);
                    }
                }
                None => {
                    return Err(InstabilityError::InsufficientSamples {
                        have: samples.len(),
                        want: n,
                    })
                }
            }
        }
        Ok(samples)
    }

    /// Numeric reading for one evaluation.
    ///
    /// A position with nothing to report (terminal, no continuation)
    /// contributes a neutral 0.0; mate scores follow the configured
    /// policy; `None` drops the sample from the sequence.
    fn sample_score(&self, eval: &Evaluation) -> Option<f64> {
        match eval.score {
            Some(Score::Centipawns(cp)) => Some(f64::from(cp)),
            Some(Score::Mate(m)) => match self.config.mate_policy {
                MatePolicy::Convert { centipawns } => {
                    let magnitude = f64::from(centipawns);
                    Some(if m >= 0 { magnitude } else { -magnitude })
                }
                MatePolicy::Exclude => None,
            },
            None => Some(0.0),
        }
    }

    /// Runs `op`, retrying transient cache failures with a short
    /// backoff. Corruption is never retried.
    fn with_retries<T>(
        &self,
        mut op: impl FnMut() -> Result<T, CacheError>,
    ) -> Result<T, InstabilityError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(CacheError::Corruption(msg)) => {
                    return Err(InstabilityError::DbCorruption(msg))
                }
                Err(CacheError::Transient(msg)) => {
                    attempt += 1;
                    if attempt > self.config.cache_retries {
                        return Err(InstabilityError::Database(msg));
                    }
                    tracing::warn!(attempt, "transient cache failure: {}", msg);
                    thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use uci_client::mock::MockEngine;
    use uci_client::EngineError;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Factory handing out scripted mock engines, counting creations.
    struct ScriptedFactory {
        scores: Vec<i32>,
        creations: Rc<Cell<usize>>,
    }

    impl ScriptedFactory {
        fn new(scores: &[i32]) -> (Self, Rc<Cell<usize>>) {
            let creations = Rc::new(Cell::new(0));
            (
                Self {
                    scores: scores.to_vec(),
                    creations: creations.clone(),
                },
                creations,
            )
        }
    }

    impl EngineFactory for ScriptedFactory {
        fn create(&self) -> Result<Box<dyn Engine>, EngineError> {
            self.creations.set(self.creations.get() + 1);
            Ok(Box::new(MockEngine::with_cp_scores(&self.scores)))
        }
    }

    /// Factory that must never be reached.
    struct ForbiddenFactory;

    impl EngineFactory for ForbiddenFactory {
        fn create(&self) -> Result<Box<dyn Engine>, EngineError> {
            panic!("engine must not be constructed for this request");
        }
    }

    /// Cache that must never be reached.
    struct ForbiddenCache;

    impl SampleCache for ForbiddenCache {
        fn get(&self, _: &str, _: u32, _: u32) -> Result<Option<Vec<f64>>, CacheError> {
            panic!("cache must not be read for this request");
        }

        fn set(&self, _: &str, _: u32, _: u32, _: &[f64]) -> Result<(), CacheError> {
            panic!("cache must not be written for this request");
        }
    }

    /// Cache whose writes always fail, counting attempts.
    struct FailingSetCache {
        corrupt: bool,
        set_calls: Rc<Cell<u32>>,
    }

    impl SampleCache for FailingSetCache {
        fn get(&self, _: &str, _: u32, _: u32) -> Result<Option<Vec<f64>>, CacheError> {
            Ok(None)
        }

        fn set(&self, _: &str, _: u32, _: u32, _: &[f64]) -> Result<(), CacheError> {
            self.set_calls.set(self.set_calls.get() + 1);
            if self.corrupt {
                Err(CacheError::Corruption("file is not a database".to_string()))
            } else {
                Err(CacheError::Transient("database is locked".to_string()))
            }
        }
    }

    fn fast_config() -> AnalyzerConfig {
        AnalyzerConfig {
            retry_backoff_ms: 1,
            ..AnalyzerConfig::default()
        }
    }

    fn analyzer_with_scores(scores: &[i32]) -> InstabilityAnalyzer {
        let (factory, _) = ScriptedFactory::new(scores);
        InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(MemoryCache::new()),
        )
    }

    #[test]
    fn test_expected_average_swing() {
        let analyzer = analyzer_with_scores(&[20, 40, 60, 80, 100]);
        let score = analyzer.analyse_instability(STARTPOS, 5, 5).unwrap();
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_one_outlier_swing() {
        let analyzer = analyzer_with_scores(&[10, 10, 10, 50]);
        let score = analyzer.analyse_instability(STARTPOS, 5, 4).unwrap();
        assert_eq!(score, 13.33);
    }

    #[test]
    fn test_single_sample_scores_zero() {
        let analyzer = analyzer_with_scores(&[123]);
        assert_eq!(analyzer.analyse_instability(STARTPOS, 8, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_identical_samples_score_zero() {
        let analyzer = analyzer_with_scores(&[50, 50, 50, 50]);
        assert_eq!(analyzer.analyse_instability(STARTPOS, 5, 4).unwrap(), 0.0);
    }

    #[test]
    fn test_result_rounded_to_two_decimals() {
        let analyzer = analyzer_with_scores(&[0, 1, 0]);
        let score = analyzer.analyse_instability(STARTPOS, 5, 3).unwrap();
        assert_eq!(score, (score * 100.0).round() / 100.0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_parameter_errors_precede_all_io() {
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(ForbiddenFactory),
            Box::new(ForbiddenCache),
        );

        for (depth, n) in [(0, 5), (5, 0), (1000, 5), (5, 1000)] {
            let result = analyzer.analyse_instability(STARTPOS, depth, n);
            assert!(
                matches!(result, Err(InstabilityError::Parameter(_))),
                "depth={} n={} must be rejected",
                depth,
                n
            );
        }
    }

    #[test]
    fn test_boundary_parameters_accepted() {
        let analyzer = analyzer_with_scores(&[0; 500]);
        assert!(analyzer.analyse_instability(STARTPOS, 50, 500).is_ok());
    }

    #[test]
    fn test_empty_and_whitespace_fen_rejected() {
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(ForbiddenFactory),
            Box::new(ForbiddenCache),
        );

        assert!(matches!(
            analyzer.analyse_instability("", 10, 5),
            Err(InstabilityError::EmptyFen)
        ));
        assert!(matches!(
            analyzer.analyse_instability("   ", 10, 5),
            Err(InstabilityError::EmptyFen)
        ));
    }

    #[test]
    fn test_illegal_fen_rejected_before_io() {
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(ForbiddenFactory),
            Box::new(ForbiddenCache),
        );

        assert!(matches!(
            analyzer.analyse_instability("not/a/fen", 10, 5),
            Err(InstabilityError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_cache_hit_never_builds_an_engine() {
        let cache = MemoryCache::new();
        cache.set(STARTPOS, 10, 3, &[3.0, 6.0, 9.0]).unwrap();

        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(ForbiddenFactory),
            Box::new(cache),
        );

        assert_eq!(analyzer.analyse_instability(STARTPOS, 10, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_short_cache_entry_still_aggregated() {
        let cache = MemoryCache::new();
        cache.set(STARTPOS, 10, 5, &[0.0, 40.0]).unwrap();

        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(ForbiddenFactory),
            Box::new(cache),
        );

        assert_eq!(analyzer.analyse_instability(STARTPOS, 10, 5).unwrap(), 40.0);
    }

    #[test]
    fn test_samples_persisted_after_miss() {
        let cache = MemoryCache::new();
        let (factory, _) = ScriptedFactory::new(&[10, 20, 30, 40, 50]);
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(cache.clone()),
        );

        analyzer.analyse_instability(STARTPOS, 10, 5).unwrap();
        assert_eq!(
            cache.get(STARTPOS, 10, 5).unwrap(),
            Some(vec![10.0, 20.0, 30.0, 40.0, 50.0])
        );
    }

    #[test]
    fn test_repeat_call_is_deterministic_and_cached() {
        let (factory, creations) = ScriptedFactory::new(&[10, 20, 30]);
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(MemoryCache::new()),
        );

        let first = analyzer.analyse_instability(STARTPOS, 10, 3).unwrap();
        let second = analyzer.analyse_instability(STARTPOS, 10, 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(creations.get(), 1);
    }

    #[test]
    fn test_insufficient_samples_rejected() {
        let analyzer = analyzer_with_scores(&[1, 2]);
        let result = analyzer.analyse_instability(STARTPOS, 5, 3);
        assert!(matches!(
            result,
            Err(InstabilityError::InsufficientSamples { have: 2, want: 3 })
        ));
    }

    fn failing_analyzer<F>(make: F) -> InstabilityAnalyzer
    where
        F: Fn() -> EngineError + Send + Clone + 'static,
    {
        let factory = move || -> Result<Box<dyn Engine>, EngineError> {
            Ok(Box::new(MockEngine::failing(make.clone())))
        };
        InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(MemoryCache::new()),
        )
    }

    #[test]
    fn test_engine_failures_remapped() {
        let analyzer = failing_analyzer(|| EngineError::Timeout(25));
        assert!(matches!(
            analyzer.analyse_instability(STARTPOS, 5, 3),
            Err(InstabilityError::EngineTimeout(25))
        ));

        let analyzer = failing_analyzer(|| EngineError::Resource("killed by signal 9".to_string()));
        assert!(matches!(
            analyzer.analyse_instability(STARTPOS, 5, 3),
            Err(InstabilityError::Resource(_))
        ));

        let analyzer = failing_analyzer(|| EngineError::Crash("terminated by signal 11".to_string()));
        assert!(matches!(
            analyzer.analyse_instability(STARTPOS, 5, 3),
            Err(InstabilityError::EngineCrash(_))
        ));
    }

    #[test]
    fn test_transient_persist_failure_retried_then_surfaced() {
        let set_calls = Rc::new(Cell::new(0));
        let cache = FailingSetCache {
            corrupt: false,
            set_calls: set_calls.clone(),
        };
        let (factory, _) = ScriptedFactory::new(&[1]);
        let analyzer =
            InstabilityAnalyzer::new(fast_config(), Box::new(factory), Box::new(cache));

        let result = analyzer.analyse_instability(STARTPOS, 5, 1);
        assert!(matches!(result, Err(InstabilityError::Database(_))));
        // Initial attempt plus the configured retries.
        assert_eq!(set_calls.get(), 4);
    }

    #[test]
    fn test_corruption_surfaced_without_retry() {
        let set_calls = Rc::new(Cell::new(0));
        let cache = FailingSetCache {
            corrupt: true,
            set_calls: set_calls.clone(),
        };
        let (factory, _) = ScriptedFactory::new(&[1]);
        let analyzer =
            InstabilityAnalyzer::new(fast_config(), Box::new(factory), Box::new(cache));

        let result = analyzer.analyse_instability(STARTPOS, 5, 1);
        assert!(matches!(result, Err(InstabilityError::DbCorruption(_))));
        assert_eq!(set_calls.get(), 1);
    }

    #[test]
    fn test_mate_scores_converted_by_default() {
        let factory = || -> Result<Box<dyn Engine>, EngineError> {
            Ok(Box::new(MockEngine::with_samples([
                Evaluation::mate(3).with_pv(["h1h8"]),
                Evaluation::centipawns(0),
            ])))
        };
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(MemoryCache::new()),
        );

        let score = analyzer.analyse_instability(STARTPOS, 5, 2).unwrap();
        assert_eq!(score, 10_000.0);
    }

    #[test]
    fn test_mate_scores_dropped_under_exclude_policy() {
        let factory = || -> Result<Box<dyn Engine>, EngineError> {
            Ok(Box::new(MockEngine::with_samples([
                Evaluation::centipawns(10),
                Evaluation::mate(-2),
                Evaluation::centipawns(30),
            ])))
        };
        let config = AnalyzerConfig {
            mate_policy: MatePolicy::Exclude,
            ..fast_config()
        };
        let analyzer =
            InstabilityAnalyzer::new(config, Box::new(factory), Box::new(MemoryCache::new()));

        // The mate reading vanishes; the swing runs 10 -> 30.
        let score = analyzer.analyse_instability(STARTPOS, 5, 3).unwrap();
        assert_eq!(score, 20.0);
    }

    #[test]
    fn test_scoreless_evaluation_reads_neutral() {
        let factory = || -> Result<Box<dyn Engine>, EngineError> {
            Ok(Box::new(MockEngine::with_samples([
                Evaluation::default(),
                Evaluation::default(),
            ])))
        };
        let analyzer = InstabilityAnalyzer::new(
            fast_config(),
            Box::new(factory),
            Box::new(MemoryCache::new()),
        );

        assert_eq!(analyzer.analyse_instability(STARTPOS, 5, 2).unwrap(), 0.0);
    }
}
