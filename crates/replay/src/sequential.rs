//! Sequential playback of every source in this process.

use std::io::{self, Write};
use std::time::Instant;

use lockstep_sim::Simulation;

use crate::checkpoint::CheckpointStore;
use crate::format::ReplayStream;
use crate::observer::{ProgressReporter, elapsed_line, wall_time};
use crate::session::{ReplaySession, SessionOutcome};
use crate::{RunSummary, SimulationOptions};

/// Play each source in turn on `sim`, writing the run report to `out`.
///
/// A source that cannot be opened, diverges, hits a corrupt packet, or fails
/// to save its requested checkpoint counts as one error; playback moves on
/// to the next source. Raising `options.stop` ends the run after the
/// current frame.
pub fn run_sequential(
    sources: &[String],
    sim: &mut dyn Simulation,
    checkpoints: &dyn CheckpointStore,
    options: &SimulationOptions,
    out: &mut dyn Write,
) -> io::Result<RunSummary> {
    let run_started = Instant::now();
    let mut errors = 0;

    for source in sources {
        writeln!(out, "Simulating Replay \"{source}\"")?;
        out.flush()?;
        let started = Instant::now();

        let path = options.replay_dir.join(source);
        let stream = match ReplayStream::open(source, &path) {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("{}: {err}", path.display());
                writeln!(out, "Cannot open replay")?;
                errors += 1;
                continue;
            }
        };
        let total_frames = stream.frame_count();

        let (result, frames_done) = {
            let mut session = match ReplaySession::start(stream, &mut *sim) {
                Ok(session) => session,
                Err(err) => {
                    log::error!("{source}: {err}");
                    writeln!(out, "Cannot open replay")?;
                    errors += 1;
                    continue;
                }
            };
            session.set_stop_handle(options.stop.clone());
            session.add_observer(Box::new(ProgressReporter::new(
                &mut *out,
                options.progress_interval,
                total_frames,
            )));
            if let Some(request) = options.checkpoint_request() {
                session.save_checkpoint_at(request, checkpoints);
            }
            let result = session.run();
            (result, session.frame())
        };

        writeln!(out, "{}", elapsed_line(started.elapsed(), frames_done, total_frames))?;
        out.flush()?;

        match result {
            Ok(SessionOutcome::Completed {
                final_checksum,
                accumulator,
                ..
            }) => {
                log::info!(
                    "{source}: completed, final checksum {final_checksum:#010x}, accumulator {accumulator:#010x}"
                );
            }
            Ok(SessionOutcome::Diverged { .. }) => errors += 1,
            Ok(SessionOutcome::CheckpointSaved { frame, name }) => {
                log::info!("{source}: stopped after saving {name} at frame {frame}");
            }
            Ok(SessionOutcome::Stopped { .. }) => break,
            Err(err) => {
                log::error!("{source}: {err}");
                errors += 1;
            }
        }
    }

    if sources.len() > 1 {
        writeln!(out, "Simulation of all replays completed. Errors occurred: {errors}")?;
        writeln!(out, "Total Time: {}", wall_time(run_started.elapsed()))?;
        out.flush()?;
    }

    Ok(RunSummary {
        sources: sources.len(),
        errors,
    })
}
