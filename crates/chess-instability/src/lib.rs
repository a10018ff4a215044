//! Chess position instability analysis.
//!
//! Scores how much a position's engine evaluation swings across
//! repeated fixed-depth searches. Repeated analysis of the same
//! position does not return identical lines, and positions where the
//! evaluation jumps around between runs are tactically sharper than
//! the bare centipawn number suggests.
//!
//! The pipeline: validate the request, check the SQLite sample cache,
//! sample a UCI engine for anything missing, persist the samples, and
//! aggregate consecutive swings into one rounded score.
//!
//! ```no_run
//! use chess_instability::{AnalyzerConfig, InstabilityAnalyzer};
//!
//! let analyzer = InstabilityAnalyzer::from_config(AnalyzerConfig::default())?;
//! let score = analyzer.analyse_instability(
//!     "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
//!     12,
//!     10,
//! )?;
//! println!("instability: {score}");
//! # Ok::<(), chess_instability::InstabilityError>(())
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
mod error;
pub mod metric;

pub use analyzer::InstabilityAnalyzer;
pub use cache::{CacheError, MemoryCache, SampleCache, SqliteCache};
pub use config::{AnalyzerConfig, ConfigError, MatePolicy};
pub use error::InstabilityError;
pub use metric::mean_absolute_swing;
