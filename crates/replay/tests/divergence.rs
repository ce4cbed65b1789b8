mod common;

use lockstep_replay::{
    ChecksumTrace, ReplaySession, ReplayStream, SessionOutcome, fold_checksum,
};
use lockstep_sim::World;

/// FrameInfo packet length: T, F, R, P, C, D fields plus a u16 count.
const FRAME_INFO_LEN: usize = 17;
/// Offset of the Location x inside a two-argument move order.
const MOVE_X_OFFSET: usize = 28;

#[test]
fn test_single_bit_flip_diverges_at_that_frame() {
    const FLIPPED_FRAME: u32 = 250;
    let fixture = common::record(9, 400, 1);
    let clean = ReplayStream::from_bytes("clean.rep", fixture.bytes.clone()).unwrap();

    let (_, batch_offset) = fixture.batch_offsets[FLIPPED_FRAME as usize];
    let at = clean.packets_start() as usize + batch_offset + FRAME_INFO_LEN + MOVE_X_OFFSET;
    let leg = (FLIPPED_FRAME / 50) as f32;
    assert_eq!(fixture.bytes[at..at + 4], (300.0 + leg * 7.0f32).to_le_bytes());

    let mut bytes = fixture.bytes.clone();
    bytes[at] ^= 0x01;
    let flipped = ReplayStream::from_bytes("flipped.rep", bytes).unwrap();

    let mut clean_trace = ChecksumTrace::new();
    let mut world = World::new();
    {
        let mut session = ReplaySession::start(clean, &mut world).unwrap();
        session.add_observer(Box::new(&mut clean_trace));
        assert!(matches!(
            session.run().unwrap(),
            SessionOutcome::Completed { frames: 400, .. }
        ));
    }

    let mut flipped_trace = ChecksumTrace::new();
    let mut world = World::new();
    let outcome = {
        let mut session = ReplaySession::start(flipped, &mut world).unwrap();
        session.add_observer(Box::new(&mut flipped_trace));
        session.run().unwrap()
    };

    match outcome {
        SessionOutcome::Diverged {
            frame,
            expected,
            actual,
        } => {
            assert_eq!(frame, FLIPPED_FRAME);
            assert_ne!(expected, actual);
        }
        other => panic!("expected divergence, got {other:?}"),
    }
    assert_eq!(clean_trace.first_difference(&flipped_trace), Some(FLIPPED_FRAME));
    assert_eq!(flipped_trace.reports().len(), FLIPPED_FRAME as usize + 1);
}

#[test]
fn test_accumulator_folds_every_frame() {
    let fixture = common::record(4, 120, 0);
    let stream = ReplayStream::from_bytes("quiet.rep", fixture.bytes).unwrap();
    let mut trace = ChecksumTrace::new();
    let mut world = World::new();
    let outcome = {
        let mut session = ReplaySession::start(stream, &mut world).unwrap();
        session.add_observer(Box::new(&mut trace));
        session.run().unwrap()
    };

    let folded = trace
        .reports()
        .iter()
        .fold(0, |acc, report| fold_checksum(acc, report.checksum));
    let SessionOutcome::Completed {
        accumulator,
        final_checksum,
        ..
    } = outcome
    else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(accumulator, folded);
    assert_eq!(Some(final_checksum), trace.reports().last().map(|r| r.checksum));
    // no recorded checksums, so nothing can diverge
    assert!(trace.reports().iter().all(|r| r.expected.is_none()));
}
