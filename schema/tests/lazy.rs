//! Sub-messages parsed on first access.

mod common;

use common::*;
use strata_macros::test_traced;
use std::{
    sync::{Arc, Barrier},
    thread,
};
use strata_schema::{Error, Message, ParseOptions, Value};
use strata_wire::{writer, Rope};

fn with_lazy_payload(payload: &[u8]) -> bytes::Bytes {
    encode(|buf| writer::write_bytes_field(buf, 14, &Rope::from(payload)))
}

#[test]
fn test_parsed_on_first_access() {
    let bytes = sample_container().to_bytes();
    let message = CONTAINER.parse(&bytes).unwrap();
    let lazy = message.lazy_field("lazy_child").unwrap();
    assert!(!lazy.is_parsed());
    assert!(lazy.has_value());
    assert!(message.has("lazy_child"));
    assert!(!lazy.is_parsed());

    // Sizing and serializing use the original bytes.
    assert_eq!(message.encoded_len(), bytes.len());
    assert!(!lazy.is_parsed());

    let child = message.get("lazy_child").unwrap().as_message().unwrap();
    assert_eq!(child.get("name").unwrap().as_str(), Some("lazy"));
    assert!(lazy.is_parsed());
    assert_eq!(message.to_bytes(), bytes);
}

#[test]
fn test_eager_when_disabled() {
    let bytes = sample_container().to_bytes();
    let options = ParseOptions {
        lazy: false,
        ..Default::default()
    };
    let message = CONTAINER.parse_with(&bytes, &options).unwrap();
    assert!(message.lazy_field("lazy_child").is_none());
    assert!(message.has("lazy_child"));
    assert_eq!(message, CONTAINER.parse(&bytes).unwrap());
}

#[test_traced("WARN")]
fn test_corruption_is_contained() {
    // A truncated varint inside the lazy payload.
    let bytes = with_lazy_payload(&[0x08, 0x80]);
    let message = CONTAINER.parse(&bytes).unwrap();
    assert!(message.has("lazy_child"));

    let child = message.get("lazy_child").unwrap().as_message().unwrap();
    assert_eq!(child, CHILD.default_instance().unwrap());

    // The corrupt bytes are still written back unchanged.
    assert_eq!(message.to_bytes(), bytes);

    // Parsed eagerly, the same input fails.
    let options = ParseOptions {
        lazy: false,
        ..Default::default()
    };
    assert_eq!(
        CONTAINER.parse_with(&bytes, &options),
        Err(Error::Wire(strata_wire::Error::MalformedVarint))
    );
}

#[test]
fn test_occurrences_merge_by_concatenation() {
    let first = child(1, "first").to_bytes();
    let mut second = CHILD.builder().unwrap();
    second.set("name", "second").unwrap();
    let second = second.build().to_bytes();

    let bytes = encode(|buf| {
        writer::write_bytes_field(buf, 14, &Rope::from(first.clone()));
        writer::write_bytes_field(buf, 14, &Rope::from(second.clone()));
    });
    let message = CONTAINER.parse(&bytes).unwrap();
    let lazy = message.lazy_field("lazy_child").unwrap();
    assert_eq!(lazy.raw().unwrap().len(), first.len() + second.len());
    assert!(!lazy.is_parsed());

    let merged = lazy.message();
    assert_eq!(merged.get("id"), Some(&Value::I32(1)));
    assert_eq!(merged.get("name").unwrap().as_str(), Some("second"));
}

#[test]
fn test_merge_into_lazy_field() {
    let bytes = with_lazy_payload(&child(1, "a").to_bytes());
    let parsed = CONTAINER.parse(&bytes).unwrap();

    let mut update = CONTAINER.builder().unwrap();
    let mut partial = CHILD.builder().unwrap();
    partial.set("name", "b").unwrap();
    update.set("lazy_child", partial.build()).unwrap();

    let mut builder = parsed.to_builder();
    builder.merge(&update.build()).unwrap();
    let merged = builder.build();
    let child = merged.get("lazy_child").unwrap().as_message().unwrap();
    assert_eq!(child.get("id"), Some(&Value::I32(1)));
    assert_eq!(child.get("name").unwrap().as_str(), Some("b"));
}

#[test]
fn test_setting_replaces_bytes() {
    let bytes = with_lazy_payload(&[0x08, 0x80]);
    let parsed = CONTAINER.parse(&bytes).unwrap();
    let mut builder = parsed.to_builder();
    builder.set("lazy_child", child(9, "new")).unwrap();
    let replaced = builder.build();

    // The field stays lazy but no longer holds the bytes it was parsed from.
    let lazy = replaced.lazy_field("lazy_child").unwrap();
    assert!(lazy.raw().is_none());
    assert!(lazy.is_parsed());
    assert_eq!(lazy.message(), &child(9, "new"));

    let encoded = replaced.to_bytes();
    assert_eq!(encoded, with_lazy_payload(&child(9, "new").to_bytes()));
    assert!(!encoded.windows(2).any(|window| window == [0x08, 0x80]));
    assert_eq!(CONTAINER.parse(&encoded).unwrap(), replaced);

    // The original keeps its bytes.
    assert_eq!(parsed.to_bytes(), bytes);
}

#[test]
fn test_concurrent_first_access() {
    let bytes = sample_container().to_bytes();
    let message = CONTAINER.parse(&bytes).unwrap();
    assert!(!message.lazy_field("lazy_child").unwrap().is_parsed());

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = barrier.clone();
            let message = message.clone();
            thread::spawn(move || {
                barrier.wait();
                let child = message
                    .get("lazy_child")
                    .and_then(Value::as_message)
                    .cloned()
                    .unwrap();
                let len = message.encoded_len();
                (child, len)
            })
        })
        .collect();

    let results: Vec<(Message, usize)> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    for (child, len) in &results {
        assert_eq!(child, &common::child(14, "lazy"));
        assert_eq!(*len, bytes.len());
    }

    // Every reader observed the single parse.
    let lazy = message.lazy_field("lazy_child").unwrap();
    assert!(lazy.is_parsed());
    assert_eq!(lazy.message(), &results[0].0);
    assert_eq!(message.to_bytes(), bytes);
    assert_eq!(CONTAINER.parse(&message.to_bytes()).unwrap(), message);
}
