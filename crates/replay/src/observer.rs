//! Per-frame observers attached to a replay session.

use std::io::Write;
use std::time::{Duration, Instant};

use lockstep_sim::{Checksum, LOGIC_FRAMES_PER_SECOND};
use lockstep_wire::FrameNumber;

/// Outcome of one executed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame that was executed (0-based).
    pub frame: FrameNumber,
    /// Simulation checksum after the frame.
    pub checksum: Checksum,
    /// Checksum the recording host reported for this frame, if any.
    pub expected: Option<Checksum>,
    /// Running accumulator after folding in `checksum`.
    pub accumulator: u32,
    pub diverged: bool,
}

impl FrameReport {
    /// Frames executed once this frame is done.
    pub fn frames_done(&self) -> FrameNumber {
        self.frame + 1
    }
}

/// Receives a report after every executed frame.
pub trait FrameObserver {
    fn on_frame(&mut self, report: &FrameReport);
}

impl<T: FrameObserver + ?Sized> FrameObserver for &mut T {
    fn on_frame(&mut self, report: &FrameReport) {
        (**self).on_frame(report);
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format `Elapsed Time: mm:ss Game Time: mm:ss/mm:ss`.
pub fn elapsed_line(elapsed: Duration, frames_done: FrameNumber, total_frames: FrameNumber) -> String {
    let real = elapsed.as_secs();
    let game = frames_done / LOGIC_FRAMES_PER_SECOND;
    let total = total_frames / LOGIC_FRAMES_PER_SECOND;
    format!(
        "Elapsed Time: {:02}:{:02} Game Time: {:02}:{:02}/{:02}:{:02}",
        real / 60,
        real % 60,
        game / 60,
        game % 60,
        total / 60,
        total % 60
    )
}

/// Format a wall time as `h:mm:ss`.
pub fn wall_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Prints an elapsed/game time line every `interval` frames of game time.
pub struct ProgressReporter<W: Write> {
    out: W,
    interval: FrameNumber,
    total_frames: FrameNumber,
    started: Instant,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, interval: FrameNumber, total_frames: FrameNumber) -> Self {
        Self {
            out,
            interval,
            total_frames,
            started: Instant::now(),
        }
    }
}

impl<W: Write> FrameObserver for ProgressReporter<W> {
    fn on_frame(&mut self, report: &FrameReport) {
        let done = report.frames_done();
        // The last frame gets the final elapsed line from the driver instead.
        if self.interval == 0 || done % self.interval != 0 || done == self.total_frames {
            return;
        }
        let line = elapsed_line(self.started.elapsed(), done, self.total_frames);
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            log::warn!("progress output failed: {err}");
        }
    }
}

// ============================================================================
// Checksum Trace
// ============================================================================

/// Keeps every frame report, for comparing two runs frame by frame.
#[derive(Debug, Default, Clone)]
pub struct ChecksumTrace {
    reports: Vec<FrameReport>,
}

impl ChecksumTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[FrameReport] {
        &self.reports
    }

    /// First frame at which `other` reports a different checksum.
    pub fn first_difference(&self, other: &ChecksumTrace) -> Option<FrameNumber> {
        self.reports
            .iter()
            .zip(&other.reports)
            .find(|(a, b)| a.frame != b.frame || a.checksum != b.checksum)
            .map(|(a, _)| a.frame)
    }
}

impl FrameObserver for ChecksumTrace {
    fn on_frame(&mut self, report: &FrameReport) {
        log::trace!(
            "frame {} checksum {:#010x} expected {:?}",
            report.frame,
            report.checksum,
            report.expected
        );
        self.reports.push(*report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(frame: FrameNumber, checksum: Checksum) -> FrameReport {
        FrameReport {
            frame,
            checksum,
            expected: None,
            accumulator: 0,
            diverged: false,
        }
    }

    #[test]
    fn test_elapsed_line_format() {
        assert_eq!(
            elapsed_line(Duration::from_secs(75), 18_000, 54_000),
            "Elapsed Time: 01:15 Game Time: 10:00/30:00"
        );
    }

    #[test]
    fn test_wall_time_format() {
        assert_eq!(wall_time(Duration::from_secs(3_725)), "1:02:05");
        assert_eq!(wall_time(Duration::from_secs(9)), "0:00:09");
    }

    #[test]
    fn test_progress_every_interval_except_last_frame() {
        let mut out = Vec::new();
        {
            let mut progress = ProgressReporter::new(&mut out, 10, 30);
            for frame in 0..30 {
                progress.on_frame(&report(frame, 0));
            }
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("Elapsed Time: ")));
    }

    #[test]
    fn test_trace_first_difference() {
        let mut a = ChecksumTrace::new();
        let mut b = ChecksumTrace::new();
        for frame in 0..5 {
            a.on_frame(&report(frame, frame));
            b.on_frame(&report(frame, if frame == 3 { 99 } else { frame }));
        }
        assert_eq!(a.first_difference(&b), Some(3));
        assert_eq!(a.first_difference(&a.clone()), None);
    }
}
