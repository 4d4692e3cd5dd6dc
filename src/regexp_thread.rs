use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// How user regular expressions are executed. The evaluator never sees the
/// choice; the five regex-consuming operations all route through
/// `RegExpBackend::exec`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegExpMode {
    /// Every regex-consuming operation throws.
    Disabled,
    /// Run on the calling thread; catastrophic backtracking is the caller's
    /// problem.
    Native,
    /// Run on a dedicated worker thread with a wall-clock timeout.
    #[default]
    Sandboxed,
}

#[derive(Debug, Clone)]
pub struct RegexJob {
    pub source: String,
    pub flags: String,
    pub subject: String,
    /// Start position in characters.
    pub last_index: usize,
}

/// One match, with positions in characters and captured substrings.
#[derive(Debug, Clone)]
pub struct RegexMatch {
    pub index: usize,
    pub end: usize,
    /// Group 0 is the whole match.
    pub captures: Vec<Option<String>>,
}

#[derive(Debug)]
pub enum RegexFailure {
    Disabled,
    Timeout,
    Syntax(String),
}

type RegexResult = Result<Option<RegexMatch>, String>;

#[derive(Debug)]
struct Worker {
    tx: Sender<RegexJob>,
    rx: Receiver<RegexResult>,
}

/// Spawn the regex worker thread and return its channel pair.
fn spawn_regexp_thread() -> Worker {
    let (job_tx, job_rx) = unbounded::<RegexJob>();
    let (result_tx, result_rx) = unbounded::<RegexResult>();

    let spawned = thread::Builder::new()
        .name("sandjs-regexp".to_string())
        .spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let result = run_job(&job);
                if result_tx.send(result).is_err() {
                    // the interpreter abandoned us after a timeout
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("failed to spawn regexp worker: {e:?}");
    }
    Worker {
        tx: job_tx,
        rx: result_rx,
    }
}

/// Compile and run a job on the current thread.
fn run_job(job: &RegexJob) -> RegexResult {
    let regex = regress::Regex::with_flags(&job.source, job.flags.as_str())
        .map_err(|e| e.to_string())?;
    let byte_start = char_to_byte(&job.subject, job.last_index);
    let Some(byte_start) = byte_start else {
        return Ok(None);
    };
    let found = regex.find_from(&job.subject, byte_start).next();
    Ok(found.map(|m| {
        let captures = m
            .captures
            .iter()
            .map(|group| {
                group
                    .clone()
                    .map(|range| job.subject[range].to_string())
            })
            .collect();
        let mut all = vec![Some(job.subject[m.start()..m.end()].to_string())];
        let mut rest: Vec<Option<String>> = captures;
        all.append(&mut rest);
        RegexMatch {
            index: byte_to_char(&job.subject, m.start()),
            end: byte_to_char(&job.subject, m.end()),
            captures: all,
        }
    }))
}

fn char_to_byte(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    if chars > s.chars().count() {
        return None;
    }
    Some(
        s.char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(s.len()),
    )
}

fn byte_to_char(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

/// Owns the worker (if any) and applies the configured isolation policy.
#[derive(Debug)]
pub struct RegExpBackend {
    mode: RegExpMode,
    timeout: Duration,
    worker: Option<Worker>,
}

impl RegExpBackend {
    pub fn new(mode: RegExpMode, timeout: Duration) -> RegExpBackend {
        RegExpBackend {
            mode,
            timeout,
            worker: None,
        }
    }

    /// Find the first match at or after `last_index` (in characters).
    pub fn exec(&mut self, job: RegexJob) -> Result<Option<RegexMatch>, RegexFailure> {
        match self.mode {
            RegExpMode::Disabled => Err(RegexFailure::Disabled),
            RegExpMode::Native => run_job(&job).map_err(RegexFailure::Syntax),
            RegExpMode::Sandboxed => {
                let worker = self.worker.get_or_insert_with(spawn_regexp_thread);
                if worker.tx.send(job).is_err() {
                    // worker died; replace it and report a timeout-shaped
                    // failure rather than wedge the caller
                    self.worker = Some(spawn_regexp_thread());
                    return Err(RegexFailure::Timeout);
                }
                match worker.rx.recv_timeout(self.timeout) {
                    Ok(result) => result.map_err(RegexFailure::Syntax),
                    Err(_) => {
                        // A Rust thread cannot be killed; abandon it. A
                        // pathological pattern keeps its thread spinning
                        // until the match completes.
                        log::warn!(
                            "regexp exceeded {:?}; abandoning worker thread",
                            self.timeout
                        );
                        self.worker = None;
                        Err(RegexFailure::Timeout)
                    }
                }
            }
        }
    }

    /// Pattern validation only; runs on the calling thread and never
    /// backtracks over user input.
    pub fn validate(source: &str, flags: &str) -> Result<(), String> {
        regress::Regex::with_flags(source, flags)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
