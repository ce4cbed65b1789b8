//! Property-based tests for the command catalog.
//!
//! For every command kind:
//! - encode/decode round trips (header fields outside the layout read back as 0)
//! - `byte_count` matches the encoded length
//! - replacing any header tag byte is rejected
//! - every strict prefix of a packet is rejected as malformed or truncated
//!
//! Plus chunk reassembly in arbitrary arrival order.

use lockstep_wire::{
    AckCommand, ChatCommand, ChunkAssembler, Command, CommandHeader, CommandKind,
    DestroyPlayerCommand, DisconnectChatCommand, DisconnectFrameCommand, DisconnectPlayerCommand,
    DisconnectScreenOffCommand, DisconnectVoteCommand, FieldTag, FileAnnounceCommand, FileCommand,
    FileProgressCommand, FrameInfoCommand, FrameResendRequestCommand, GameArgument, GameCommand,
    GameMessage, PlayerLeaveCommand, ProgressCommand, RunAheadCommand, RunAheadMetricsCommand,
    WireError, WrapperCommand, split_into_chunks,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn header_strategy() -> impl Strategy<Value = CommandHeader> {
    (any::<u8>(), any::<u8>(), any::<u32>(), any::<u16>()).prop_map(
        |(player_id, relay, frame, command_id)| CommandHeader {
            player_id,
            relay,
            frame,
            command_id,
        },
    )
}

// Finite values only; NaN never compares equal to itself.
fn real_strategy() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<char>(), 0..120).prop_map(|chars| chars.into_iter().collect())
}

fn filename_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{0,64}"
}

fn argument_strategy() -> impl Strategy<Value = GameArgument> {
    prop_oneof![
        any::<i32>().prop_map(GameArgument::Integer),
        real_strategy().prop_map(GameArgument::Real),
        any::<bool>().prop_map(GameArgument::Boolean),
        any::<u32>().prop_map(GameArgument::ObjectId),
        any::<u32>().prop_map(GameArgument::DrawableId),
        any::<u32>().prop_map(GameArgument::TeamId),
        (real_strategy(), real_strategy(), real_strategy())
            .prop_map(|(x, y, z)| GameArgument::Location { x, y, z }),
        (any::<i32>(), any::<i32>()).prop_map(|(x, y)| GameArgument::Pixel { x, y }),
        any::<[i32; 4]>().prop_map(|[a, b, c, d]| GameArgument::PixelRegion {
            lo: (a, b),
            hi: (c, d),
        }),
        any::<u32>().prop_map(GameArgument::Timestamp),
        any::<u16>().prop_map(GameArgument::WideChar),
    ]
}

fn message_strategy() -> impl Strategy<Value = GameMessage> {
    (any::<u32>(), proptest::collection::vec(argument_strategy(), 0..24)).prop_map(
        |(message_type, arguments)| GameMessage {
            message_type,
            arguments,
        },
    )
}

fn wrapper_strategy(header: CommandHeader) -> impl Strategy<Value = Command> {
    (
        any::<u16>(),
        1u32..16,
        proptest::collection::vec(any::<u8>(), 0..256),
        0u32..64,
    )
        .prop_flat_map(move |(wrapped_command_id, num_chunks, data, slack)| {
            let len = data.len() as u32;
            (0..num_chunks, 0..=slack).prop_map(move |(chunk_number, data_offset)| {
                Command::Wrapper(WrapperCommand {
                    header,
                    wrapped_command_id,
                    chunk_number,
                    num_chunks,
                    total_data_length: len + slack,
                    data_offset,
                    data: data.clone(),
                })
            })
        })
}

/// A command of `kind` with arbitrary header and body.
fn command_strategy(kind: CommandKind) -> BoxedStrategy<Command> {
    let h = header_strategy();
    match kind {
        CommandKind::AckBoth | CommandKind::AckStage1 | CommandKind::AckStage2 => {
            (h, any::<u16>(), any::<u8>())
                .prop_map(move |(header, command_id, original_player_id)| {
                    let ack = AckCommand {
                        header,
                        command_id,
                        original_player_id,
                    };
                    match kind {
                        CommandKind::AckBoth => Command::AckBoth(ack),
                        CommandKind::AckStage1 => Command::AckStage1(ack),
                        _ => Command::AckStage2(ack),
                    }
                })
                .boxed()
        }
        CommandKind::FrameInfo => (h, any::<u16>())
            .prop_map(|(header, command_count)| {
                Command::FrameInfo(FrameInfoCommand {
                    header,
                    command_count,
                })
            })
            .boxed(),
        CommandKind::GameCommand => (h, message_strategy())
            .prop_map(|(header, message)| Command::Game(GameCommand { header, message }))
            .boxed(),
        CommandKind::PlayerLeave => (h, any::<u8>())
            .prop_map(|(header, leaving_player_id)| {
                Command::PlayerLeave(PlayerLeaveCommand {
                    header,
                    leaving_player_id,
                })
            })
            .boxed(),
        CommandKind::RunAheadMetrics => (h, real_strategy(), any::<u16>())
            .prop_map(|(header, average_latency, average_fps)| {
                Command::RunAheadMetrics(RunAheadMetricsCommand {
                    header,
                    average_latency,
                    average_fps,
                })
            })
            .boxed(),
        CommandKind::RunAhead => (h, any::<u16>(), any::<u8>())
            .prop_map(|(header, run_ahead, frame_rate)| {
                Command::RunAhead(RunAheadCommand {
                    header,
                    run_ahead,
                    frame_rate,
                })
            })
            .boxed(),
        CommandKind::DestroyPlayer => (h, any::<u32>())
            .prop_map(|(header, player_index)| {
                Command::DestroyPlayer(DestroyPlayerCommand {
                    header,
                    player_index,
                })
            })
            .boxed(),
        CommandKind::KeepAlive => h.prop_map(Command::KeepAlive).boxed(),
        CommandKind::DisconnectChat => (h, text_strategy())
            .prop_map(|(header, text)| {
                Command::DisconnectChat(DisconnectChatCommand { header, text })
            })
            .boxed(),
        CommandKind::Chat => (h, text_strategy(), any::<i32>())
            .prop_map(|(header, text, player_mask)| {
                Command::Chat(ChatCommand {
                    header,
                    text,
                    player_mask,
                })
            })
            .boxed(),
        CommandKind::Progress => (h, 0u8..=100)
            .prop_map(|(header, percentage)| {
                Command::Progress(ProgressCommand { header, percentage })
            })
            .boxed(),
        CommandKind::LoadComplete => h.prop_map(Command::LoadComplete).boxed(),
        CommandKind::TimeoutGameStart => h.prop_map(Command::TimeoutGameStart).boxed(),
        CommandKind::Wrapper => h.prop_flat_map(wrapper_strategy).boxed(),
        CommandKind::File => (
            h,
            filename_strategy(),
            proptest::collection::vec(any::<u8>(), 0..512),
        )
            .prop_map(|(header, filename, data)| {
                Command::File(FileCommand {
                    header,
                    filename,
                    data,
                })
            })
            .boxed(),
        CommandKind::FileAnnounce => (h, filename_strategy(), any::<u16>(), any::<u8>())
            .prop_map(|(header, filename, file_id, player_mask)| {
                Command::FileAnnounce(FileAnnounceCommand {
                    header,
                    filename,
                    file_id,
                    player_mask,
                })
            })
            .boxed(),
        CommandKind::FileProgress => (h, any::<u16>(), any::<i32>())
            .prop_map(|(header, file_id, progress)| {
                Command::FileProgress(FileProgressCommand {
                    header,
                    file_id,
                    progress,
                })
            })
            .boxed(),
        CommandKind::FrameResendRequest => (h, any::<u32>())
            .prop_map(|(header, frame_to_resend)| {
                Command::FrameResendRequest(FrameResendRequestCommand {
                    header,
                    frame_to_resend,
                })
            })
            .boxed(),
        CommandKind::DisconnectKeepAlive => h.prop_map(Command::DisconnectKeepAlive).boxed(),
        CommandKind::DisconnectPlayer => (h, any::<u8>(), any::<u32>())
            .prop_map(|(header, slot, disconnect_frame)| {
                Command::DisconnectPlayer(DisconnectPlayerCommand {
                    header,
                    slot,
                    disconnect_frame,
                })
            })
            .boxed(),
        CommandKind::RouterQuery => h.prop_map(Command::RouterQuery).boxed(),
        CommandKind::RouterAck => h.prop_map(Command::RouterAck).boxed(),
        CommandKind::DisconnectVote => (h, any::<u8>(), any::<u32>())
            .prop_map(|(header, slot, vote_frame)| {
                Command::DisconnectVote(DisconnectVoteCommand {
                    header,
                    slot,
                    vote_frame,
                })
            })
            .boxed(),
        CommandKind::DisconnectFrame => (h, any::<u32>())
            .prop_map(|(header, disconnect_frame)| {
                Command::DisconnectFrame(DisconnectFrameCommand {
                    header,
                    disconnect_frame,
                })
            })
            .boxed(),
        CommandKind::DisconnectScreenOff => (h, any::<u32>())
            .prop_map(|(header, new_frame)| {
                Command::DisconnectScreenOff(DisconnectScreenOffCommand { header, new_frame })
            })
            .boxed(),
    }
}

fn any_command() -> impl Strategy<Value = Command> {
    proptest::sample::select(CommandKind::ALL.to_vec()).prop_flat_map(command_strategy)
}

/// Byte offsets of the tag bytes in `kind`'s header.
fn tag_offsets(kind: CommandKind) -> Vec<(usize, FieldTag)> {
    let mut offset = 0;
    kind.layout()
        .iter()
        .map(|&tag| {
            let at = offset;
            offset += tag.encoded_len();
            (at, tag)
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_roundtrip_every_kind(command in any_command()) {
        let kind = command.kind();
        let bytes = command.encode();
        prop_assert_eq!(bytes.len(), command.byte_count());

        let decoded = Command::decode_as(kind, &bytes).unwrap();
        prop_assert_eq!(decoded.kind(), kind);
        prop_assert_eq!(*decoded.header(), command.header().normalized(kind));
        // Body fields survive exactly, so re-encoding is byte-identical.
        prop_assert_eq!(decoded.encode(), bytes.clone());
        prop_assert_eq!(Command::decode(&bytes).unwrap(), decoded);
    }

    #[test]
    fn prop_any_replaced_tag_is_violation(command in any_command(), pick in any::<proptest::sample::Index>()) {
        let kind = command.kind();
        let mut bytes = command.encode();
        let offsets = tag_offsets(kind);
        let (at, tag) = offsets[pick.index(offsets.len())];

        for other in FieldTag::ALL.into_iter().filter(|&t| t != tag) {
            bytes[at] = other.byte();
            let err = Command::decode_as(kind, &bytes).unwrap_err();
            prop_assert!(
                matches!(err, WireError::ProtocolViolation { .. }),
                "{:?}: {} replaced by {} gave {:?}", kind, tag, other, err
            );
        }
    }

    #[test]
    fn prop_every_prefix_is_rejected(command in any_command()) {
        let bytes = command.encode();
        for cut in 0..bytes.len() {
            let err = Command::decode(&bytes[..cut]).unwrap_err();
            prop_assert!(
                matches!(
                    err,
                    WireError::MalformedField { .. } | WireError::TruncatedPayload { .. }
                ),
                "{:?} cut at {} gave {:?}", command.kind(), cut, err
            );
        }
    }

    #[test]
    fn prop_concatenated_stream_decodes_in_order(commands in proptest::collection::vec(any_command(), 1..8)) {
        let mut stream = Vec::new();
        for command in &commands {
            command.encode_into(&mut stream);
        }
        let mut cursor = 0;
        for command in &commands {
            let (decoded, used) = Command::decode_prefix(&stream[cursor..]).unwrap();
            prop_assert_eq!(decoded.kind(), command.kind());
            prop_assert_eq!(used, command.byte_count());
            cursor += used;
        }
        prop_assert_eq!(cursor, stream.len());
    }

    #[test]
    fn prop_chunks_reassemble_in_any_order(
        (payload, chunks) in (proptest::collection::vec(any::<u8>(), 0..2048), 1usize..300)
            .prop_flat_map(|(payload, max_len)| {
                let chunks = split_into_chunks(CommandHeader::new(1), 77, &payload, max_len);
                (Just(payload), Just(chunks).prop_shuffle())
            })
    ) {
        let mut assembler = ChunkAssembler::new();
        let mut result = None;
        for chunk in &chunks {
            // Every chunk also survives the wire.
            let bytes = Command::Wrapper(chunk.clone()).encode();
            let Command::Wrapper(decoded) = Command::decode(&bytes).unwrap() else {
                panic!("wrapper decoded as another kind");
            };
            prop_assert!(result.is_none());
            result = assembler.push(&decoded).unwrap();
        }
        prop_assert_eq!(result, Some(payload));
    }
}

#[test]
fn test_every_kind_has_a_strategy() {
    // command_strategy matches exhaustively; this pins the catalog size.
    assert_eq!(CommandKind::ALL.len(), 27);
}
