//! `lockstep`: verify recorded lockstep sessions by replaying them.
//!
//! ```text
//! lockstep [REPLAYS]...                        play sources one after another
//! lockstep -j 4 [REPLAYS]...                   play in up to 4 worker processes
//! lockstep match.rep --save-at-frame 1000 --save-to mid.ckpt
//! lockstep match.rep --load-checkpoint mid.ckpt
//! lockstep record demo.rep --frames 3600       write a synthetic recording
//! ```
//!
//! Parallel workers are this binary, started on a single source.

#![deny(unsafe_code)]

mod demo;

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use lockstep_replay::{
    DirectoryCheckpointStore, DispatchMode, LocalFileSystem, ProcessLauncher, ReplayError,
    SimulationOptions, continue_from_checkpoint, simulate_replays, write_replay,
};
use lockstep_sim::World;
use lockstep_wire::FrameNumber;
use thiserror::Error;

use crate::demo::DemoMatch;

#[derive(Parser, Debug)]
#[command(
    name = "lockstep",
    about = "Replay recorded lockstep sessions and check every recorded checksum",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        default_value = "Replays",
        help = "Directory replay names are relative to"
    )]
    replay_dir: PathBuf,

    #[command(flatten)]
    play: PlayArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(value_name = "REPLAYS", help = "Replay names; * and ? expand within a directory")]
    replays: Vec<String>,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        help = "Play in up to N worker processes instead of in this process"
    )]
    jobs: Option<usize>,

    #[arg(
        long,
        value_name = "DIR",
        default_value = "Save",
        help = "Directory checkpoints are saved to and loaded from"
    )]
    save_dir: PathBuf,

    #[arg(
        long,
        value_name = "FRAME",
        requires = "save_to",
        conflicts_with = "jobs",
        help = "Save a checkpoint once FRAME frames have run, then stop"
    )]
    save_at_frame: Option<FrameNumber>,

    #[arg(long, value_name = "NAME", requires = "save_at_frame", help = "Checkpoint name")]
    save_to: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        conflicts_with_all = ["jobs", "save_at_frame"],
        help = "Resume the first replay from this checkpoint"
    )]
    load_checkpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic recording of the reference world
    Record(RecordArgs),
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[arg(value_name = "NAME", help = "Replay name under the replay directory")]
    name: String,

    #[arg(long, default_value_t = 1800, help = "Frames to record")]
    frames: FrameNumber,

    #[arg(long, default_value_t = 1)]
    seed: u32,

    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=8))]
    players: u8,

    #[arg(long, default_value = "Flat Plains")]
    map: String,

    #[arg(long, default_value_t = 30, help = "Frames between recorded checksums (0 for none)")]
    crc_interval: FrameNumber,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("no replays given")]
    NoReplays,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Some(Command::Record(args)) => record(&cli.replay_dir, args),
        None => play(cli.replay_dir, cli.play),
    }
}

fn options(replay_dir: PathBuf, args: &PlayArgs) -> SimulationOptions {
    SimulationOptions {
        replay_dir,
        save_dir: args.save_dir.clone(),
        save_at_frame: args.save_at_frame,
        save_to: args.save_to.clone(),
        ..Default::default()
    }
}

/// Arguments a worker needs besides its source.
fn worker_args(options: &SimulationOptions) -> Vec<OsString> {
    vec![
        OsString::from("--replay-dir"),
        options.replay_dir.clone().into_os_string(),
        OsString::from("--save-dir"),
        options.save_dir.clone().into_os_string(),
    ]
}

fn play(replay_dir: PathBuf, args: PlayArgs) -> Result<i32, CliError> {
    if args.replays.is_empty() {
        return Err(CliError::NoReplays);
    }
    let options = options(replay_dir, &args);
    let store = DirectoryCheckpointStore::new(&options.save_dir);
    let mut world = World::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(checkpoint) = &args.load_checkpoint {
        return Ok(continue_from_checkpoint(
            &args.replays,
            checkpoint,
            &mut world,
            &store,
            &options,
            &mut out,
        ));
    }

    let summary = match args.jobs {
        Some(max_processes) if max_processes > 0 => {
            let mut launcher = ProcessLauncher::current_exe(worker_args(&options))?;
            simulate_replays(
                &args.replays,
                &LocalFileSystem,
                DispatchMode::Parallel {
                    launcher: &mut launcher,
                    max_processes,
                },
                &options,
                &mut out,
            )?
        }
        _ => simulate_replays(
            &args.replays,
            &LocalFileSystem,
            DispatchMode::Sequential {
                simulation: &mut world,
                checkpoints: &store,
            },
            &options,
            &mut out,
        )?,
    };
    out.flush()?;
    Ok(summary.exit_code())
}

fn record(replay_dir: &std::path::Path, args: RecordArgs) -> Result<i32, CliError> {
    let demo = DemoMatch {
        map_name: args.map,
        seed: args.seed,
        players: args.players,
        frames: args.frames,
        crc_interval: args.crc_interval,
    };
    let bytes = demo.record()?;
    let path = replay_dir.join(&args.name);
    write_replay(&bytes, &path)?;
    println!("Recorded {} frames to {}", args.frames, path.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parallel_run() {
        let cli = Cli::try_parse_from(["lockstep", "-j", "4", "a.rep", "ladder/*.rep"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.play.jobs, Some(4));
        assert_eq!(cli.play.replays, vec!["a.rep", "ladder/*.rep"]);
        assert_eq!(cli.replay_dir, PathBuf::from("Replays"));
    }

    #[test]
    fn test_save_flags_require_each_other() {
        assert!(Cli::try_parse_from(["lockstep", "a.rep", "--save-at-frame", "10"]).is_err());
        assert!(Cli::try_parse_from(["lockstep", "a.rep", "--save-to", "x"]).is_err());
        let cli = Cli::try_parse_from([
            "lockstep",
            "a.rep",
            "--save-at-frame",
            "10",
            "--save-to",
            "x",
        ])
        .unwrap();
        let options = options(cli.replay_dir, &cli.play);
        assert_eq!(options.checkpoint_request().map(|r| r.frame), Some(10));
    }

    #[test]
    fn test_load_checkpoint_excludes_parallel() {
        assert!(
            Cli::try_parse_from(["lockstep", "a.rep", "-j", "2", "--load-checkpoint", "c"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_record() {
        let cli = Cli::try_parse_from([
            "lockstep",
            "--replay-dir",
            "out",
            "record",
            "demo.rep",
            "--frames",
            "90",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Record(args)) => {
                assert_eq!(args.name, "demo.rep");
                assert_eq!(args.frames, 90);
                assert_eq!(args.players, 2);
            }
            other => panic!("expected record, got {other:?}"),
        }
        assert_eq!(cli.replay_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_worker_args_carry_directories() {
        let options = SimulationOptions::default();
        assert_eq!(
            worker_args(&options),
            vec!["--replay-dir", "Replays", "--save-dir", "Save"]
        );
    }

    #[test]
    fn test_worker_argv_keeps_odd_source_names_positional() {
        let options = SimulationOptions::default();
        let launcher = ProcessLauncher::new("lockstep", worker_args(&options));
        for source in ["record", "-old.rep"] {
            let argv =
                std::iter::once(OsString::from("lockstep")).chain(launcher.args_for(source));
            let cli = Cli::try_parse_from(argv).unwrap();
            assert!(cli.command.is_none());
            assert_eq!(cli.play.replays, vec![source]);
            assert_eq!(cli.replay_dir, PathBuf::from("Replays"));
            assert_eq!(cli.play.save_dir, PathBuf::from("Save"));
        }
    }
}
