//! Process-backed UCI analysis client.
//!
//! [`UciEngine`] owns one external engine process and drives a single
//! `position`/`go` exchange at a time. Engine stdout is pumped by a
//! dedicated reader thread into a channel, so the analysis loop can
//! re-check its deadline and the child's liveness between reads instead
//! of blocking on the pipe.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crate::command::{
    build_go_command, build_position_command, build_setoption_command, SearchLimits,
};
use crate::evaluation::{Evaluation, Score};
use crate::fen::validate_fen;
use crate::EngineError;

/// Default sleep between empty reads of the engine's output.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Slack added to the `movetime` budget before the client gives up, so
/// an engine that uses its whole budget is not raced to the wire by our
/// own clock.
const DEADLINE_GRACE_MS: u64 = 50;

/// Polls granted to a process whose stdout closed before it exits, so
/// its exit status can still be classified.
const EOF_GRACE_POLLS: u32 = 20;

/// Lines buffered between the reader thread and the analysis loop.
/// Bounded so a chatty engine blocks on the pipe instead of growing
/// process memory.
const LINE_QUEUE_CAPACITY: usize = 256;

/// Lines consumed per loop iteration before the deadline and liveness
/// are re-checked. An engine that floods output must not starve the
/// deadline check.
const DRAIN_BATCH_LINES: usize = 32;

/// Capability set of an analysis engine.
///
/// Two implementations exist: the process-backed [`UciEngine`] and the
/// deterministic [`MockEngine`](crate::mock::MockEngine). Callers pick
/// one by injection, typically through an [`EngineFactory`].
pub trait Engine {
    /// Sends one option to the engine and records it locally.
    ///
    /// The engine's acceptance is not verified; a rejected option leaves
    /// the recorded value out of sync with true engine state.
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError>;

    /// Last value set for `name`, if any.
    fn get_option(&self, name: &str) -> Option<&str>;

    /// Evaluates the position once within the given limits.
    ///
    /// `Ok(None)` means the engine has no further samples to offer.
    fn analyse(
        &mut self,
        fen: &str,
        limits: SearchLimits,
    ) -> Result<Option<Evaluation>, EngineError>;

    /// Best-effort shutdown; never fails.
    fn close(&mut self);
}

/// Creates engines on demand.
///
/// The analyzer layer acquires one engine per sampling run through this
/// trait, so tests can substitute doubles without touching the analyzer.
pub trait EngineFactory {
    /// Builds a ready-to-use engine.
    fn create(&self) -> Result<Box<dyn Engine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Box<dyn Engine>, EngineError>,
{
    fn create(&self) -> Result<Box<dyn Engine>, EngineError> {
        self()
    }
}

/// Factory spawning a fresh [`UciEngine`] per request.
pub struct UciEngineFactory {
    path: PathBuf,
}

impl UciEngineFactory {
    /// Factory bound to the given engine executable.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl EngineFactory for UciEngineFactory {
    fn create(&self) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(UciEngine::launch(&self.path)?))
    }
}

/// UCI engine driven over stdin/stdout pipes.
///
/// The process and both pipe ends are exclusively owned by this value.
/// [`close`](Engine::close) (also run on drop) terminates the child on
/// every exit path.
pub struct UciEngine {
    process: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    options: HashMap<String, String>,
    poll_interval: Duration,
}

impl UciEngine {
    /// Spawns the engine process with piped stdio.
    ///
    /// Fails with [`EngineError::Launch`] when the binary is missing,
    /// unreadable, or not executable. No protocol traffic is exchanged
    /// at launch; the wire surface is exactly `setoption`, `position`
    /// and `go`.
    pub fn launch<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        tracing::debug!("launching engine at {}", path.display());

        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Launch(format!("{}: {}", path.display(), e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Launch("engine stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Launch("engine stdout unavailable".to_string()))?;

        let (tx, rx) = std::sync::mpsc::sync_channel(LINE_QUEUE_CAPACITY);
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            process,
            stdin: Some(stdin),
            lines: rx,
            options: HashMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the sleep between empty reads.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Writes one protocol line to the engine.
    fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::Crash("engine stdin already closed".to_string()))?;
        let written = writeln!(stdin, "{}", cmd).and_then(|_| stdin.flush());
        match written {
            Ok(()) => Ok(()),
            // A dead child shows up as a pipe error first; report the
            // exit instead of the symptom.
            Err(e) => match self.process.try_wait() {
                Ok(Some(status)) => Err(classify_exit(status)),
                _ => Err(EngineError::Crash(format!(
                    "failed to write to engine: {}",
                    e
                ))),
            },
        }
    }

    /// Reads lines until `bestmove`, racing the deadline and the
    /// child's liveness on every iteration.
    fn read_until_bestmove(
        &mut self,
        deadline: Option<Instant>,
        budget_ms: u64,
    ) -> Result<Evaluation, EngineError> {
        let mut current: Option<Evaluation> = None;
        loop {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    tracing::warn!("engine missed its {} ms budget, terminating", budget_ms);
                    self.terminate();
                    return Err(EngineError::Timeout(budget_ms));
                }
            }

            // Output the child flushed before dying must still be
            // honored, so drain the channel ahead of the liveness check.
            // The drain is batched, not exhaustive: the deadline above
            // must stay reachable under continuous output.
            for _ in 0..DRAIN_BATCH_LINES {
                match self.lines.try_recv() {
                    Ok(line) => {
                        if let Some(eval) = handle_line(&line, &mut current)? {
                            return Ok(eval);
                        }
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            match self.process.try_wait() {
                Ok(Some(status)) => return Err(classify_exit(status)),
                Ok(None) => {}
                Err(e) => {
                    return Err(EngineError::Crash(format!(
                        "engine status unavailable: {}",
                        e
                    )))
                }
            }

            match self.lines.recv_timeout(self.poll_interval) {
                Ok(line) => {
                    if let Some(eval) = handle_line(&line, &mut current)? {
                        return Ok(eval);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(self.exit_after_eof()),
            }
        }
    }

    /// Classifies a child whose stdout closed mid-request.
    fn exit_after_eof(&mut self) -> EngineError {
        for _ in 0..EOF_GRACE_POLLS {
            match self.process.try_wait() {
                Ok(Some(status)) => return classify_exit(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    return EngineError::Crash(format!("engine status unavailable: {}", e))
                }
            }
        }
        self.terminate();
        EngineError::Crash("engine closed its output stream without sending bestmove".to_string())
    }

    fn terminate(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }

    fn shutdown(&mut self) {
        // Ask politely first; dropping stdin closes the pipe either way.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "quit");
            let _ = stdin.flush();
        }
        self.terminate();
    }
}

impl Engine for UciEngine {
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        let cmd = build_setoption_command(name, value)?;
        self.send(&cmd)?;
        self.options.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get_option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn analyse(
        &mut self,
        fen: &str,
        limits: SearchLimits,
    ) -> Result<Option<Evaluation>, EngineError> {
        validate_fen(fen)?;
        // Built (and therefore validated) before any traffic is written.
        let go = build_go_command(&limits)?;
        self.send(&build_position_command(fen))?;
        self.send(&go)?;

        // Wall clock starts just after the go command is on the wire.
        let budget_ms = limits.time_ms.unwrap_or(0);
        let deadline = limits
            .time_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms + DEADLINE_GRACE_MS));

        self.read_until_bestmove(deadline, budget_ms).map(Some)
    }

    fn close(&mut self) {
        self.shutdown();
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Processes one protocol line. Returns the final evaluation once the
/// `bestmove` marker arrives.
fn handle_line(
    line: &str,
    current: &mut Option<Evaluation>,
) -> Result<Option<Evaluation>, EngineError> {
    if line.starts_with("info ") {
        *current = Some(parse_info_line(line)?);
        Ok(None)
    } else if line.starts_with("bestmove") {
        match current.take() {
            Some(eval) => Ok(Some(eval)),
            None => Err(EngineError::Parse(
                "bestmove received before any evaluation".to_string(),
            )),
        }
    } else {
        // Banner or chatter outside the request grammar.
        Ok(None)
    }
}

/// Maps a child exit status onto the failure taxonomy.
///
/// SIGKILL is what the OS delivers when it reclaims resources (OOM
/// kills included); other signals are crashes; plain exit codes are
/// process failures.
fn classify_exit(status: ExitStatus) -> EngineError {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(9) => return EngineError::Resource(status.to_string()),
            Some(sig) => return EngineError::Crash(format!("terminated by signal {}", sig)),
            None => {}
        }
    }
    EngineError::Process(status.code().unwrap_or(-1))
}

/// Parses one `info` line.
///
/// The line must carry `score (cp|mate) <int>`; PV tokens follow a
/// later `pv` marker and may be absent entirely.
fn parse_info_line(line: &str) -> Result<Evaluation, EngineError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let score_idx = tokens
        .iter()
        .position(|&t| t == "score")
        .ok_or_else(|| EngineError::Parse(format!("info line without score: {}", line)))?;
    let kind = tokens
        .get(score_idx + 1)
        .copied()
        .ok_or_else(|| EngineError::Parse(format!("score without cp/mate marker: {}", line)))?;
    let value: i32 = tokens
        .get(score_idx + 2)
        .ok_or_else(|| EngineError::Parse(format!("score without a value: {}", line)))?
        .parse()
        .map_err(|_| EngineError::Parse(format!("non-integer score value: {}", line)))?;

    let score = match kind {
        "cp" => Score::Centipawns(value),
        "mate" => Score::Mate(value),
        other => {
            return Err(EngineError::Parse(format!(
                "unknown score kind '{}': {}",
                other, line
            )))
        }
    };

    let pv = tokens
        .iter()
        .position(|&t| t == "pv")
        .map(|i| tokens[i + 1..].iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();

    Ok(Evaluation {
        score: Some(score),
        pv,
    })
}
