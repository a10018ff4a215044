//! Deterministic engine double.
//!
//! [`MockEngine`] implements [`Engine`] without a process behind it, so
//! the analyzer layer can be exercised with scripted evaluations and
//! injected failures. Selected by dependency injection, never special
//! cased by the code under test.

use std::collections::{HashMap, VecDeque};

use crate::command::{build_setoption_command, SearchLimits};
use crate::engine::Engine;
use crate::evaluation::Evaluation;
use crate::EngineError;

enum Behaviour {
    /// Same evaluation for every request.
    Fixed(Evaluation),
    /// One scripted evaluation per request, then "no further samples".
    Scripted(VecDeque<Evaluation>),
    /// Every request fails with a freshly built error.
    Failing(Box<dyn Fn() -> EngineError + Send>),
}

/// In-memory stand-in for a UCI engine.
pub struct MockEngine {
    behaviour: Behaviour,
    options: HashMap<String, String>,
    analyse_calls: usize,
    closed: bool,
}

impl MockEngine {
    /// Double with the fixed baseline evaluation: +20 centipawns,
    /// pv `["e2e4"]`.
    pub fn new() -> Self {
        Self::fixed(Evaluation::centipawns(20).with_pv(["e2e4"]))
    }

    /// Double returning `eval` for every request.
    pub fn fixed(eval: Evaluation) -> Self {
        Self {
            behaviour: Behaviour::Fixed(eval),
            options: HashMap::new(),
            analyse_calls: 0,
            closed: false,
        }
    }

    /// Double playing back `samples` one per request; once exhausted,
    /// `analyse` answers `Ok(None)`.
    pub fn with_samples<I: IntoIterator<Item = Evaluation>>(samples: I) -> Self {
        Self {
            behaviour: Behaviour::Scripted(samples.into_iter().collect()),
            options: HashMap::new(),
            analyse_calls: 0,
            closed: false,
        }
    }

    /// Scripted double built from plain centipawn scores.
    pub fn with_cp_scores(scores: &[i32]) -> Self {
        Self::with_samples(scores.iter().map(|&cp| Evaluation::centipawns(cp)))
    }

    /// Double failing every request with an error built by `make`.
    pub fn failing<F>(make: F) -> Self
    where
        F: Fn() -> EngineError + Send + 'static,
    {
        Self {
            behaviour: Behaviour::Failing(Box::new(make)),
            options: HashMap::new(),
            analyse_calls: 0,
            closed: false,
        }
    }

    /// Number of `analyse` calls seen so far.
    pub fn analyse_calls(&self) -> usize {
        self.analyse_calls
    }

    /// Whether `close` has been invoked.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        // Same wire validation as the real client, minus the wire.
        build_setoption_command(name, value)?;
        self.options.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get_option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn analyse(
        &mut self,
        _fen: &str,
        _limits: SearchLimits,
    ) -> Result<Option<Evaluation>, EngineError> {
        self.analyse_calls += 1;
        match &mut self.behaviour {
            Behaviour::Fixed(eval) => Ok(Some(eval.clone())),
            Behaviour::Scripted(queue) => Ok(queue.pop_front()),
            Behaviour::Failing(make) => Err(make()),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
