//! Parsing from a contiguous buffer and from a stream must agree on every input.

mod common;

use bytes::{Buf, Bytes};
use common::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use strata_schema::{Error, Message, MessageType, ParseOptions};

/// Parses `bytes` with both strategies (the stream one over two pieces) and checks that they
/// agree.
fn parse_both(ty: &'static MessageType, bytes: &Bytes, options: &ParseOptions) -> Result<Message, Error> {
    let array = ty.parse_with(bytes, options);
    let stream = ty.parse_from(bytes.clone(), options);
    assert_eq!(array, stream);
    let split = bytes.len() / 2;
    let chained = ty.parse_from(bytes.slice(..split).chain(bytes.slice(split..)), options);
    assert_eq!(array, chained);
    array
}

#[test]
fn test_every_prefix() {
    let bytes = sample_container().to_bytes();
    let options = ParseOptions::default();
    let mut complete = 0;
    for len in 0..=bytes.len() {
        let prefix = bytes.slice(..len);
        match parse_both(&CONTAINER, &prefix, &options) {
            // A prefix that parses holds exactly the fields it fully contains.
            Ok(message) => {
                assert_eq!(message.to_bytes(), prefix);
                complete += 1;
            }
            Err(Error::Wire(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    // At least the empty prefix, the whole message and every top-level field boundary.
    assert!(complete > 10);
}

#[test]
fn test_every_prefix_eager() {
    let bytes = sample_container().to_bytes();
    let options = ParseOptions {
        lazy: false,
        ..Default::default()
    };
    for len in 0..=bytes.len() {
        let prefix = bytes.slice(..len);
        if let Ok(message) = parse_both(&CONTAINER, &prefix, &options) {
            assert_eq!(message.to_bytes(), prefix);
        }
    }
}

#[test]
fn test_random_corruption() {
    let bytes = sample_container().to_bytes();
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..2_000 {
        let mut corrupted = bytes.to_vec();
        for _ in 0..rng.gen_range(1..4) {
            let i = rng.gen_range(0..corrupted.len());
            corrupted[i] = rng.gen();
        }
        let corrupted = Bytes::from(corrupted);
        for limit in [2, 100] {
            let options = ParseOptions {
                recursion_limit: limit,
                ..Default::default()
            };
            if let Ok(message) = parse_both(&CONTAINER, &corrupted, &options) {
                // Whatever parsed must serialize and parse back to itself.
                let reencoded = message.to_bytes();
                assert_eq!(CONTAINER.parse_with(&reencoded, &options).unwrap(), message);
            }
        }
    }
}

#[test]
fn test_random_input() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..5_000 {
        let len = rng.gen_range(0..64);
        let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let data = Bytes::from(data);
        for ty in [&CONTAINER, &SCALARS, &PROTO3, &CHILD] {
            let _ = parse_both(ty, &data, &ParseOptions::default());
        }
    }
}

#[test]
fn test_malformed_inputs_fail_alike() {
    let cases: [(&[u8], strata_wire::Error); 8] = [
        (&[0x00], strata_wire::Error::InvalidTag(0)),
        (&[0x0F], strata_wire::Error::InvalidWireType(7)),
        (&[0x0C], strata_wire::Error::InvalidEndGroup(1)),
        (&[0x08], strata_wire::Error::MalformedVarint),
        (&[0x08, 0x80], strata_wire::Error::MalformedVarint),
        (&[0x0A, 0x05, 0x01], strata_wire::Error::TruncatedMessage),
        (
            &[0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
            strata_wire::Error::MalformedLength(u32::MAX as u64),
        ),
        (&[0x1B, 0x08, 0x01], strata_wire::Error::UnterminatedGroup(3)),
    ];
    for (input, expected) in cases {
        let input = Bytes::from_static(input);
        let result = parse_both(&CONTAINER, &input, &ParseOptions::default());
        assert_eq!(result, Err(Error::Wire(expected)), "input {input:?}");
    }
}

#[test]
fn test_recursion_limit() {
    let bytes = chain(10).to_bytes();
    let limited = |recursion_limit| ParseOptions {
        recursion_limit,
        ..Default::default()
    };
    assert!(parse_both(&CHILD, &bytes, &limited(9)).is_ok());
    assert_eq!(
        parse_both(&CHILD, &bytes, &limited(8)),
        Err(Error::Wire(strata_wire::Error::RecursionLimitExceeded(8)))
    );
}

#[test]
fn test_size_limit() {
    let bytes = sample_container().to_bytes();
    let options = ParseOptions {
        size_limit: 16,
        ..Default::default()
    };
    assert_eq!(
        parse_both(&CONTAINER, &bytes, &options),
        Err(Error::Wire(strata_wire::Error::SizeLimitExceeded(
            bytes.len(),
            16
        )))
    );
}
