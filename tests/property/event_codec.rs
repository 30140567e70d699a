//! Property tests for the realtime frame codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never makes `decode` panic, for either direction.
//! 2. Envelopes with unknown event names are rejected, not misread.
//! 3. `task:updated` patches keep the absent / `null` / value distinction
//!    across encode and decode.
//! 4. `task:moved` frames survive encode and decode unchanged.

use proptest::prelude::*;
use taskboard_proto::codec;
use taskboard_proto::event::{TaskMoved, TaskUpdated};
use taskboard_proto::{ClientEvent, EventKind, Priority, ServerEvent, TaskPatch};

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
    ]
}

/// Absent, explicit `null`, or a value.
fn arb_nullable() -> impl Strategy<Value = Option<Option<String>>> {
    prop_oneof![
        Just(None),
        Just(Some(None)),
        "[a-zA-Z0-9 ]{0,32}".prop_map(|s| Some(Some(s))),
    ]
}

fn arb_patch() -> impl Strategy<Value = TaskPatch> {
    (
        proptest::option::of("\\PC{1,64}"),
        arb_nullable(),
        proptest::option::of(arb_priority()),
        proptest::option::of(0u32..1000),
        proptest::option::of("[a-z-]{1,12}"),
    )
        .prop_map(|(title, description, priority, position, column)| TaskPatch {
            title,
            description,
            priority,
            position,
            column_id: column.map(Into::into),
            ..TaskPatch::default()
        })
}

proptest! {
    #[test]
    fn decode_never_panics(text in "\\PC{0,256}") {
        let _ = codec::decode::<ServerEvent>(&text);
        let _ = codec::decode::<ClientEvent>(&text);
    }

    #[test]
    fn decode_never_panics_on_envelope_shapes(
        name in "[a-z]{1,8}:[a-z]{1,8}",
        data in "\\PC{0,64}",
    ) {
        let frame = format!(r#"{{"event":"{name}","data":{data}}}"#);
        let _ = codec::decode::<ServerEvent>(&frame);
    }

    #[test]
    fn unknown_event_names_are_rejected(name in "[a-z]{1,8}:[a-z]{1,8}") {
        prop_assume!(EventKind::ALL.iter().all(|kind| kind.name() != name));
        prop_assume!(name != "join:project" && name != "leave:project");
        let frame = format!(r#"{{"event":"{name}","data":{{}}}}"#);
        prop_assert!(codec::decode::<ServerEvent>(&frame).is_err());
        prop_assert!(codec::decode::<ClientEvent>(&frame).is_err());
    }

    #[test]
    fn updated_patch_keeps_field_presence(patch in arb_patch()) {
        let event = ServerEvent::TaskUpdated(TaskUpdated {
            project_id: "p1".into(),
            task_id: "t1".into(),
            updates: patch,
        });
        let text = codec::encode(&event).unwrap();
        let decoded: ServerEvent = codec::decode(&text).unwrap();
        prop_assert_eq!(decoded, event);
    }

    #[test]
    fn moved_frames_survive(
        task in "[a-z0-9-]{1,36}",
        column in "[a-z-]{1,12}",
        position in any::<u32>(),
    ) {
        let event = ServerEvent::TaskMoved(TaskMoved {
            project_id: "p1".into(),
            task_id: task.into(),
            column_id: column.into(),
            position,
        });
        let decoded: ServerEvent = codec::decode(&codec::encode(&event).unwrap()).unwrap();
        prop_assert_eq!(decoded.kind(), EventKind::TaskMoved);
        prop_assert_eq!(decoded, event);
    }
}
