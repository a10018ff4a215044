//! UCI analysis engine client.
//!
//! This crate drives an external UCI-compatible analysis engine (like
//! Stockfish) over its line-oriented text protocol and parses streamed
//! search output into [`Evaluation`] values.
//!
//! # Overview
//!
//! - [`Engine`] - capability set of an analysis engine (`analyse`,
//!   `set_option`, `close`)
//! - [`UciEngine`] - process-backed implementation with deadline and
//!   liveness handling
//! - [`MockEngine`](mock::MockEngine) - deterministic test double
//! - [`SearchLimits`] - depth / movetime bounds for one request
//! - [`EngineError`] - the failure taxonomy shared by both variants
//!
//! # Example
//!
//! ```ignore
//! use uci_client::{Engine, SearchLimits, UciEngine};
//!
//! let mut engine = UciEngine::launch("/usr/bin/stockfish")?;
//! let eval = engine.analyse(fen, SearchLimits::depth(15))?;
//! engine.close();
//! ```

pub mod command;
pub mod engine;
mod error;
pub mod evaluation;
pub mod fen;
pub mod mock;

pub use command::SearchLimits;
pub use engine::{Engine, EngineFactory, UciEngine, UciEngineFactory};
pub use error::EngineError;
pub use evaluation::{Evaluation, Score};
pub use fen::validate_fen;
