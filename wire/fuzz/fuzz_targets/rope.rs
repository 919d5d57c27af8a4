#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_wire::Rope;

#[derive(Arbitrary, Debug)]
enum Op {
    Append(Vec<u8>),
    Prepend(Vec<u8>),
    Substring(usize, usize),
    AppendSelf,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut rope = Rope::new();
    let mut expected: Vec<u8> = Vec::new();
    for op in ops {
        match op {
            Op::Append(bytes) => {
                rope = rope.concat(&Rope::from(bytes.as_slice()));
                expected.extend_from_slice(&bytes);
            }
            Op::Prepend(bytes) => {
                rope = Rope::from(bytes.as_slice()).concat(&rope);
                expected.splice(0..0, bytes);
            }
            Op::Substring(a, b) => {
                let len = expected.len();
                let (start, end) = (a % (len + 1), b % (len + 1));
                let (start, end) = (start.min(end), start.max(end));
                rope = rope.substring(start, end);
                expected = expected[start..end].to_vec();
            }
            Op::AppendSelf => {
                if expected.len() < 1 << 20 {
                    rope = rope.concat(&rope);
                    expected.extend_from_slice(&expected.clone());
                }
            }
        }
        assert!(rope.is_balanced());
        assert_eq!(rope.len(), expected.len());
    }
    assert_eq!(rope.to_vec(), expected);
    assert_eq!(rope, Rope::from(expected));
});
