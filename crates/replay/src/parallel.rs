//! Parallel playback: one worker process per source, bounded pool.
//!
//! The dispatcher alone owns the pool. Jobs are kept in submission order and
//! drained from the front only, so results print in source order no matter
//! which worker finishes first.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::RunSummary;
use crate::error::ReplayError;
use crate::observer::wall_time;

// ============================================================================
// Worker Contract
// ============================================================================

/// State of a worker as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Done { output: String, exit_code: i32 },
}

/// A running playback of one source.
pub trait Worker {
    /// Non-blocking status check.
    fn poll(&mut self) -> WorkerStatus;
}

/// Starts workers.
pub trait WorkerLauncher {
    fn launch(&mut self, source: &str) -> io::Result<Box<dyn Worker>>;
}

// ============================================================================
// Process Launcher
// ============================================================================

/// Runs each source in a child process: `program [base_args...] -- <source>`.
///
/// The child's stdout goes to an anonymous temporary file, read back once
/// the child exits.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Launch workers as copies of the running executable.
    pub fn current_exe(base_args: Vec<OsString>) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, base_args))
    }

    /// The child's arguments for `source`. The source follows `--` so a name
    /// like `record` or `-old.rep` is never read as a subcommand or flag.
    pub fn args_for(&self, source: &str) -> Vec<OsString> {
        let mut args = self.base_args.clone();
        args.push(OsString::from("--"));
        args.push(OsString::from(source));
        args
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&mut self, source: &str) -> io::Result<Box<dyn Worker>> {
        let capture = tempfile::tempfile()?;
        let child = Command::new(&self.program)
            .args(self.args_for(source))
            .stdin(Stdio::null())
            .stdout(Stdio::from(capture.try_clone()?))
            .spawn()?;
        log::debug!("worker {} started for {source}", child.id());
        Ok(Box::new(ProcessWorker { child, capture }))
    }
}

struct ProcessWorker {
    child: Child,
    capture: File,
}

impl ProcessWorker {
    fn collect_output(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.capture.seek(SeekFrom::Start(0))?;
        self.capture.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Worker for ProcessWorker {
    fn poll(&mut self) -> WorkerStatus {
        match self.child.try_wait() {
            Ok(None) => WorkerStatus::Running,
            Ok(Some(status)) => {
                let output = self
                    .collect_output()
                    .unwrap_or_else(|err| format!("(output unavailable: {err})\n"));
                // Killed by a signal: no code, counts as failure.
                let exit_code = status.code().unwrap_or(1);
                WorkerStatus::Done { output, exit_code }
            }
            Err(err) => WorkerStatus::Done {
                output: format!("worker wait failed: {err}\n"),
                exit_code: 1,
            },
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct Job {
    source: String,
    worker: Option<Box<dyn Worker>>,
    result: Option<(String, i32)>,
}

impl Job {
    fn poll(&mut self) {
        if let Some(worker) = &mut self.worker
            && let WorkerStatus::Done { output, exit_code } = worker.poll()
        {
            self.result = Some((output, exit_code));
            self.worker = None;
        }
    }

    fn is_running(&self) -> bool {
        self.result.is_none()
    }
}

/// Play `sources` in at most `max_processes` concurrent workers, printing
/// each worker's captured output as `i/N <output>` in submission order.
///
/// # Panics
///
/// Panics if, once the pool is empty, the number of started or drained jobs
/// differs from the number of sources.
pub fn run_parallel(
    sources: &[String],
    launcher: &mut dyn WorkerLauncher,
    max_processes: usize,
    poll_interval: Duration,
    out: &mut dyn Write,
) -> io::Result<RunSummary> {
    let started_at = Instant::now();
    let total = sources.len();
    let max_processes = max_processes.max(1);

    let mut jobs: VecDeque<Job> = VecDeque::new();
    let mut started = 0;
    let mut drained = 0;
    let mut errors = 0;

    loop {
        for job in &mut jobs {
            job.poll();
        }

        while let Some((output, exit_code)) = jobs.front_mut().and_then(|job| job.result.take()) {
            let job = jobs.pop_front();
            drained += 1;
            write!(out, "{drained}/{total} {output}")?;
            if !output.is_empty() && !output.ends_with('\n') {
                writeln!(out)?;
            }
            if exit_code != 0 {
                writeln!(out, "Error!")?;
                errors += 1;
                if let Some(job) = job {
                    log::warn!("{} exited with code {exit_code}", job.source);
                }
            }
            out.flush()?;
        }

        let mut running = jobs.iter().filter(|job| job.is_running()).count();
        while running < max_processes && started < total {
            let source = &sources[started];
            let job = match launcher.launch(source) {
                Ok(worker) => Job {
                    source: source.clone(),
                    worker: Some(worker),
                    result: None,
                },
                Err(error) => {
                    let err = ReplayError::WorkerSpawn {
                        source_name: source.clone(),
                        error,
                    };
                    log::error!("{err}");
                    Job {
                        source: source.clone(),
                        worker: None,
                        result: Some((format!("{err}\n"), 1)),
                    }
                }
            };
            if job.is_running() {
                running += 1;
            }
            jobs.push_back(job);
            started += 1;
        }

        if jobs.is_empty() {
            break;
        }
        thread::sleep(poll_interval);
    }

    assert_eq!(started, total, "inconsistent start count");
    assert_eq!(drained, total, "inconsistent drain count");

    writeln!(out, "Simulation of all replays completed. Errors occurred: {errors}")?;
    writeln!(out, "Total Wall Time: {}", wall_time(started_at.elapsed()))?;
    out.flush()?;

    Ok(RunSummary {
        sources: total,
        errors,
    })
}
