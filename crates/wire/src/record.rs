//! Protobuf records stored alongside the packet stream.
//!
//! Packets are hand-encoded so their layout is byte-exact. The records here
//! describe a recording and a resume point; they are not part of the lockstep
//! traffic and use prost so new fields can be added without a format bump.

use prost::Message;

use crate::FrameNumber;

// ============================================================================
// Replay Header
// ============================================================================

/// One occupied player slot at game start.
#[derive(Clone, PartialEq, Message)]
pub struct RosterSlotProto {
    /// Slot index; this is the `P` value the slot's commands carry.
    #[prost(uint32, tag = "1")]
    pub slot: u32,

    #[prost(string, tag = "2")]
    pub player_name: String,

    #[prost(int32, tag = "3")]
    pub team: i32,
}

/// Header of a recorded command stream.
#[derive(Clone, PartialEq, Message)]
pub struct ReplayHeaderProto {
    /// Map the game was played on.
    #[prost(string, tag = "1")]
    pub map_name: String,

    /// Player who hosted (and recorded) the game.
    #[prost(string, tag = "2")]
    pub host_name: String,

    /// Seed for the simulation's random streams.
    #[prost(uint32, tag = "3")]
    pub seed: u32,

    /// Frames executed by the recording host. Playback ends here.
    #[prost(uint32, tag = "4")]
    pub frame_count: FrameNumber,

    /// Occupied slots, ordered by slot index.
    #[prost(message, repeated, tag = "5")]
    pub roster: Vec<RosterSlotProto>,

    /// Build that produced the recording (informational).
    #[prost(string, tag = "6")]
    pub build_version: String,
}

// ============================================================================
// Checkpoint
// ============================================================================

/// A resumable point inside a replay.
#[derive(Clone, PartialEq, Message)]
pub struct CheckpointProto {
    /// Replay file the checkpoint was taken from, relative to the replay dir.
    #[prost(string, tag = "1")]
    pub replay_name: String,

    /// Lowercase hex SHA-256 of the replay file bytes.
    #[prost(string, tag = "2")]
    pub replay_sha256: String,

    #[prost(string, tag = "3")]
    pub map_name: String,

    #[prost(string, tag = "4")]
    pub host_name: String,

    /// Frames executed when the checkpoint was taken.
    #[prost(uint32, tag = "5")]
    pub frame: FrameNumber,

    /// Running checksum accumulator at `frame`.
    #[prost(uint32, tag = "6")]
    pub checksum_accumulator: u32,

    /// Byte offset of the next unread packet in the replay file.
    #[prost(uint64, tag = "7")]
    pub stream_offset: u64,

    /// True when taken during replay playback. Only such checkpoints can
    /// resume a replay.
    #[prost(bool, tag = "8")]
    pub playback_mode: bool,

    /// Opaque simulation state.
    #[prost(bytes = "vec", tag = "9")]
    pub sim_state: Vec<u8>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_roundtrip() {
        let checkpoint = CheckpointProto {
            replay_name: "ladder/game-01.rep".to_string(),
            replay_sha256: "ab".repeat(32),
            map_name: "Tournament Desert".to_string(),
            host_name: "host".to_string(),
            frame: 1000,
            checksum_accumulator: 0xDEAD_BEEF,
            stream_offset: 4096,
            playback_mode: true,
            sim_state: vec![1, 2, 3],
        };
        let bytes = checkpoint.encode_to_vec();
        assert_eq!(CheckpointProto::decode(bytes.as_slice()).unwrap(), checkpoint);
    }

    #[test]
    fn test_header_roster_order_preserved() {
        let header = ReplayHeaderProto {
            map_name: "Alpine Assault".to_string(),
            host_name: "alice".to_string(),
            seed: 99,
            frame_count: 54_000,
            roster: vec![
                RosterSlotProto {
                    slot: 0,
                    player_name: "alice".to_string(),
                    team: 0,
                },
                RosterSlotProto {
                    slot: 3,
                    player_name: "bob".to_string(),
                    team: 1,
                },
            ],
            build_version: String::new(),
        };
        let decoded = ReplayHeaderProto::decode(header.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.roster[1].slot, 3);
        assert_eq!(decoded, header);
    }
}
