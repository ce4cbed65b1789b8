use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use lockstep_replay::{
    DispatchMode, FileEnumerator, SimulationOptions, Worker, WorkerLauncher, WorkerStatus,
    simulate_replays,
};

/// Shared view of the fake pool.
#[derive(Default)]
struct Pool {
    launched: Vec<String>,
    live: usize,
    peak: usize,
}

/// Workers launched later finish sooner, so completion order is the reverse
/// of submission order.
struct ReverseWorker {
    source: String,
    polls_left: usize,
    pool: Rc<RefCell<Pool>>,
}

impl Worker for ReverseWorker {
    fn poll(&mut self) -> WorkerStatus {
        if self.polls_left > 0 {
            self.polls_left -= 1;
            return WorkerStatus::Running;
        }
        self.pool.borrow_mut().live -= 1;
        WorkerStatus::Done {
            output: format!("checked {}\n", self.source),
            exit_code: i32::from(self.source == "r3.rep"),
        }
    }
}

struct ReverseLauncher {
    total: usize,
    pool: Rc<RefCell<Pool>>,
}

impl WorkerLauncher for ReverseLauncher {
    fn launch(&mut self, source: &str) -> io::Result<Box<dyn Worker>> {
        let mut pool = self.pool.borrow_mut();
        pool.launched.push(source.to_string());
        pool.live += 1;
        pool.peak = pool.peak.max(pool.live);
        let polls_left = (self.total - pool.launched.len()) * 3;
        Ok(Box::new(ReverseWorker {
            source: source.to_string(),
            polls_left,
            pool: Rc::clone(&self.pool),
        }))
    }
}

struct NoFiles;

impl FileEnumerator for NoFiles {
    fn list_matching(&self, _dir: &std::path::Path, _wildcard: &str) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_five_sources_two_workers_drain_in_order() {
    let sources: Vec<String> = (1..=5).map(|i| format!("r{i}.rep")).collect();
    let pool = Rc::new(RefCell::new(Pool::default()));
    let mut launcher = ReverseLauncher {
        total: sources.len(),
        pool: Rc::clone(&pool),
    };
    let options = SimulationOptions {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let mut out = Vec::new();
    let summary = simulate_replays(
        &sources,
        &NoFiles,
        DispatchMode::Parallel {
            launcher: &mut launcher,
            max_processes: 2,
        },
        &options,
        &mut out,
    )
    .unwrap();

    assert_eq!(summary.sources, 5);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.exit_code(), 1);

    let pool = pool.borrow();
    assert_eq!(pool.launched, sources);
    assert_eq!(pool.peak, 2);
    assert_eq!(pool.live, 0);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[..6],
        [
            "1/5 checked r1.rep",
            "2/5 checked r2.rep",
            "3/5 checked r3.rep",
            "Error!",
            "4/5 checked r4.rep",
            "5/5 checked r5.rep",
        ]
    );
    assert_eq!(lines[6], "Simulation of all replays completed. Errors occurred: 1");
    assert!(lines[7].starts_with("Total Wall Time: "));
    assert_eq!(lines.len(), 8);
}

#[test]
fn test_unmatched_wildcard_runs_nothing() {
    let pool = Rc::new(RefCell::new(Pool::default()));
    let mut launcher = ReverseLauncher {
        total: 0,
        pool: Rc::clone(&pool),
    };
    let mut out = Vec::new();
    let summary = simulate_replays(
        &["*.rep".to_string()],
        &NoFiles,
        DispatchMode::Parallel {
            launcher: &mut launcher,
            max_processes: 4,
        },
        &SimulationOptions::default(),
        &mut out,
    )
    .unwrap();
    assert_eq!(summary.sources, 0);
    assert_eq!(summary.exit_code(), 0);
    assert!(pool.borrow().launched.is_empty());
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Simulation of all replays completed. Errors occurred: 0"));
}
