//! Unrecognized fields and enum values.

mod common;

use common::*;
use strata_macros::test_traced;
use strata_schema::{MapKey, ParseOptions, UnknownValue, Value};
use strata_wire::{varint, writer, Rope, WireType};

#[test_traced]
fn test_unknown_fields_round_trip() {
    let bytes = encode(|buf| {
        writer::write_tag(buf, 1, WireType::Varint);
        varint::write(5u64, buf);
        writer::write_bytes_field(buf, 50, &Rope::from("extra"));
        writer::write_tag(buf, 51, WireType::Fixed32);
        writer::write_fixed32(buf, 9);
        writer::write_tag(buf, 52, WireType::StartGroup);
        writer::write_tag(buf, 1, WireType::Fixed64);
        writer::write_fixed64(buf, 3);
        writer::write_tag(buf, 52, WireType::EndGroup);
    });
    let message = CHILD.parse(&bytes).unwrap();
    assert_eq!(message.get("id"), Some(&Value::I32(5)));

    let unknown = message.unknown_fields();
    assert_eq!(unknown.len(), 3);
    assert_eq!(
        unknown.get(50).collect::<Vec<_>>(),
        [&UnknownValue::LengthDelimited(Rope::from("extra"))]
    );
    let Some(UnknownValue::Group(group)) = unknown.get(52).next() else {
        panic!("expected a group");
    };
    assert_eq!(group.get(1).next(), Some(&UnknownValue::Fixed64(3)));

    // Untouched unknown fields are written back byte for byte.
    assert_eq!(message.to_bytes(), bytes);
}

#[test]
fn test_wrong_wire_type_is_unknown() {
    let bytes = encode(|buf| {
        writer::write_tag(buf, 1, WireType::Fixed32);
        writer::write_fixed32(buf, 5);
    });
    let message = CHILD.parse(&bytes).unwrap();
    assert!(!message.has("id"));
    assert_eq!(
        message.unknown_fields().get(1).next(),
        Some(&UnknownValue::Fixed32(5))
    );
    assert_eq!(message.to_bytes(), bytes);
}

#[test_traced("TRACE")]
fn test_closed_enum_singular() {
    let bytes = encode(|buf| {
        writer::write_tag(buf, 7, WireType::Varint);
        varint::write(5u64, buf);
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    assert!(!message.has("color"));
    assert_eq!(
        message.unknown_fields().get(7).next(),
        Some(&UnknownValue::Varint(5))
    );
    assert_eq!(message.to_bytes(), bytes);

    // Negative values keep their sign-extended encoding.
    let bytes = encode(|buf| {
        writer::write_tag(buf, 7, WireType::Varint);
        varint::write_i32(-1, buf);
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    assert_eq!(
        message.unknown_fields().get(7).next(),
        Some(&UnknownValue::Varint(u64::MAX))
    );
    assert_eq!(message.to_bytes(), bytes);
}

#[test]
fn test_closed_enum_repeated_and_packed() {
    let bytes = encode(|buf| {
        for value in [1u64, 5, 2] {
            writer::write_tag(buf, 8, WireType::Varint);
            varint::write(value, buf);
        }
        writer::write_tag(buf, 9, WireType::LengthDelimited);
        writer::write_length(buf, 3);
        for value in [1u8, 7, 2] {
            varint::write(value, buf);
        }
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    assert_eq!(
        message.get_repeated("color_list"),
        &[Value::Enum(1), Value::Enum(2)]
    );
    assert_eq!(
        message.get_repeated("packed_colors"),
        &[Value::Enum(1), Value::Enum(2)]
    );
    let unknown: Vec<_> = message.unknown_fields().iter().collect();
    assert_eq!(
        unknown,
        [(8, &UnknownValue::Varint(5)), (9, &UnknownValue::Varint(7))]
    );

    // The re-encoding is stable even though it differs from the input.
    let reencoded = message.to_bytes();
    let reparsed = CONTAINER.parse(&reencoded).unwrap();
    assert_eq!(reparsed, message);
    assert_eq!(reparsed.to_bytes(), reencoded);
}

#[test]
fn test_closed_enum_map_entry() {
    let entry = encode(|buf| {
        writer::write_bytes_field(buf, 1, &Rope::from("sea"));
        writer::write_tag(buf, 2, WireType::Varint);
        varint::write(9u64, buf);
    });
    let bytes = encode(|buf| {
        writer::write_bytes_field(buf, 6, &Rope::from(entry.clone()));
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    assert!(message.get_map("colors").is_none());
    assert_eq!(
        message.unknown_fields().get(6).next(),
        Some(&UnknownValue::LengthDelimited(Rope::from(entry)))
    );
    assert_eq!(message.to_bytes(), bytes);
}

#[test]
fn test_open_enum_keeps_value() {
    let bytes = encode(|buf| {
        writer::write_tag(buf, 4, WireType::Varint);
        varint::write(9u64, buf);
    });
    let message = PROTO3.parse(&bytes).unwrap();
    assert_eq!(message.get("level"), Some(&Value::Enum(9)));
    assert!(message.unknown_fields().is_empty());
    assert_eq!(message.to_bytes(), bytes);
}

#[test]
fn test_discard_on_parse() {
    let bytes = encode(|buf| {
        writer::write_bytes_field(buf, 50, &Rope::from("extra"));
        writer::write_tag(buf, 7, WireType::Varint);
        varint::write(5u64, buf);
        writer::write_tag(buf, 52, WireType::StartGroup);
        writer::write_tag(buf, 52, WireType::EndGroup);
    });
    let options = ParseOptions {
        discard_unknown: true,
        ..Default::default()
    };
    let message = CONTAINER.parse_with(&bytes, &options).unwrap();
    assert!(message.unknown_fields().is_empty());
    assert!(message.to_bytes().is_empty());
}

#[test]
fn test_discard_recursively() {
    let inner = encode(|buf| {
        writer::write_tag(buf, 1, WireType::Varint);
        varint::write(1u64, buf);
        writer::write_tag(buf, 60, WireType::Varint);
        varint::write(2u64, buf);
    });
    let bytes = encode(|buf| {
        writer::write_bytes_field(buf, 1, &Rope::from(inner.clone()));
        writer::write_bytes_field(buf, 2, &Rope::from(inner.clone()));
        let entry = encode(|entry| {
            writer::write_tag(entry, 1, WireType::Varint);
            varint::write(4u64, entry);
            writer::write_bytes_field(entry, 2, &Rope::from(inner.clone()));
        });
        writer::write_bytes_field(buf, 5, &Rope::from(entry));
        writer::write_bytes_field(buf, 14, &Rope::from(inner.clone()));
        writer::write_tag(buf, 61, WireType::Varint);
        varint::write(3u64, buf);
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    assert_eq!(message.unknown_fields().len(), 1);

    let mut builder = message.to_builder();
    builder.discard_unknown_fields();
    let cleaned = builder.build();
    assert!(cleaned.unknown_fields().is_empty());
    let child = cleaned.get("child").unwrap().as_message().unwrap();
    assert!(child.unknown_fields().is_empty());
    assert_eq!(child.get("id"), Some(&Value::I32(1)));
    let listed = cleaned.get_repeated("children")[0].as_message().unwrap();
    assert!(listed.unknown_fields().is_empty());
    let mapped = &cleaned.get_map("by_id").unwrap()[&MapKey::from(4)];
    assert!(mapped.as_message().unwrap().unknown_fields().is_empty());
    let lazy = cleaned.get("lazy_child").unwrap().as_message().unwrap();
    assert!(lazy.unknown_fields().is_empty());

    // The original is untouched.
    let child = message.get("child").unwrap().as_message().unwrap();
    assert_eq!(child.unknown_fields().len(), 1);
    assert_eq!(message.to_bytes(), bytes);
}
