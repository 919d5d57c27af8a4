//! UTF-8 validation.
//!
//! A byte sequence is valid iff decoding it to text and re-encoding the text reproduces the same
//! bytes. Concretely, the following are rejected:
//! - continuation bytes (`0x80..=0xBF`) without a leading byte
//! - overlong encodings (leading bytes `0xC0`, `0xC1`, and `0xE0`/`0xF0` followed by a second byte
//!   that would encode a code point representable in fewer bytes)
//! - surrogate code points `U+D800..=U+DFFF` (`0xED` followed by `0xA0..=0xBF`)
//! - code points above `U+10FFFF` (leading bytes above `0xF4`, or `0xF4` followed by `0x90..`)
//! - sequences truncated before their final continuation byte
//!
//! Two implementations are provided and must agree on every input. [portable] is a byte-class
//! state machine that can also validate input delivered in pieces (see [State]); [fast] skips
//! ASCII a word at a time and checks multi-byte sequences directly.

/// Validates `bytes` using the fastest available implementation.
#[inline]
pub fn is_valid(bytes: &[u8]) -> bool {
    fast::is_valid(bytes)
}

/// The state of an incremental validation.
///
/// Feeding the pieces of a sequence through [portable::partial] one at a time yields the same
/// answer as validating the concatenation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State(u8);

impl State {
    /// The state before any byte has been seen (and after every complete code point).
    pub const START: Self = Self(portable::ACCEPT);

    /// Returns whether every byte seen so far forms complete, valid code points.
    pub const fn is_complete(self) -> bool {
        self.0 == portable::ACCEPT
    }

    /// Returns whether the input seen so far can never become valid.
    pub const fn is_rejected(self) -> bool {
        self.0 == portable::REJECT
    }
}

/// A portable, table-driven validator.
pub mod portable {
    use super::State;

    pub(super) const ACCEPT: u8 = 0;
    pub(super) const REJECT: u8 = 1;
    const NEED1: u8 = 2; // one continuation byte left
    const NEED2: u8 = 3; // two continuation bytes left
    const NEED3: u8 = 4; // three continuation bytes left
    const E0: u8 = 5; // after 0xE0: second byte must be 0xA0..=0xBF
    const ED: u8 = 6; // after 0xED: second byte must be 0x80..=0x9F
    const F0: u8 = 7; // after 0xF0: second byte must be 0x90..=0xBF
    const F4: u8 = 8; // after 0xF4: second byte must be 0x80..=0x8F

    const STATES: usize = 9;
    const CLASSES: usize = 12;

    /// Maps a byte to its class.
    const fn class(byte: u8) -> u8 {
        match byte {
            0x00..=0x7F => 0,
            0x80..=0x8F => 1,
            0x90..=0x9F => 2,
            0xA0..=0xBF => 3,
            0xC2..=0xDF => 5,
            0xE0 => 6,
            0xE1..=0xEC | 0xEE..=0xEF => 7,
            0xED => 8,
            0xF0 => 9,
            0xF1..=0xF3 => 10,
            0xF4 => 11,
            // 0xC0, 0xC1 and 0xF5..=0xFF never appear in valid text.
            _ => 4,
        }
    }

    const fn build_classes() -> [u8; 256] {
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            table[i] = class(i as u8);
            i += 1;
        }
        table
    }

    static CLASS: [u8; 256] = build_classes();

    const R: u8 = REJECT;

    #[rustfmt::skip]
    static TRANSITIONS: [[u8; CLASSES]; STATES] = [
        //          ascii  80-8F  90-9F  A0-BF  inval  C2-DF  E0     E1-EF  ED     F0     F1-F3  F4
        /* ACCEPT */ [ACCEPT, R,    R,     R,     R,     NEED1, E0,    NEED2, ED,    F0,    NEED3, F4],
        /* REJECT */ [R,     R,     R,     R,     R,     R,     R,     R,     R,     R,     R,     R],
        /* NEED1  */ [R,     ACCEPT, ACCEPT, ACCEPT, R,  R,     R,     R,     R,     R,     R,     R],
        /* NEED2  */ [R,     NEED1, NEED1, NEED1, R,     R,     R,     R,     R,     R,     R,     R],
        /* NEED3  */ [R,     NEED2, NEED2, NEED2, R,     R,     R,     R,     R,     R,     R,     R],
        /* E0     */ [R,     R,     R,     NEED1, R,     R,     R,     R,     R,     R,     R,     R],
        /* ED     */ [R,     NEED1, NEED1, R,     R,     R,     R,     R,     R,     R,     R,     R],
        /* F0     */ [R,     R,     NEED2, NEED2, R,     R,     R,     R,     R,     R,     R,     R],
        /* F4     */ [R,     NEED2, R,     R,     R,     R,     R,     R,     R,     R,     R,     R],
    ];

    /// Returns whether `bytes` is valid UTF-8.
    pub fn is_valid(bytes: &[u8]) -> bool {
        partial(State::START, bytes).is_complete()
    }

    /// Advances an incremental validation over the next piece of input.
    pub fn partial(state: State, bytes: &[u8]) -> State {
        let mut current = state.0;
        for &byte in bytes {
            current = TRANSITIONS[current as usize][CLASS[byte as usize] as usize];
            if current == REJECT {
                break;
            }
        }
        State(current)
    }
}

/// A validator that skips ASCII eight bytes at a time.
pub mod fast {
    const ASCII_MASK: u64 = 0x8080_8080_8080_8080;

    #[inline]
    fn is_continuation(byte: u8) -> bool {
        byte & 0xC0 == 0x80
    }

    /// Returns whether `bytes` is valid UTF-8.
    pub fn is_valid(bytes: &[u8]) -> bool {
        let len = bytes.len();
        let mut i = 0;
        while i < len {
            // Skip whole words of ASCII.
            if let Some(word) = bytes.get(i..i + 8) {
                if let Ok(word) = <[u8; 8]>::try_from(word) {
                    if u64::from_ne_bytes(word) & ASCII_MASK == 0 {
                        i += 8;
                        continue;
                    }
                }
            }

            let lead = bytes[i];
            if lead < 0x80 {
                i += 1;
                continue;
            }

            let width = match lead {
                0xC2..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF4 => 4,
                _ => return false,
            };
            if len - i < width {
                return false;
            }

            let second = bytes[i + 1];
            let second_ok = match lead {
                0xE0 => (0xA0..=0xBF).contains(&second),
                0xED => (0x80..=0x9F).contains(&second),
                0xF0 => (0x90..=0xBF).contains(&second),
                0xF4 => (0x80..=0x8F).contains(&second),
                _ => is_continuation(second),
            };
            if !second_ok {
                return false;
            }
            if !bytes[i + 2..i + width].iter().all(|&b| is_continuation(b)) {
                return false;
            }
            i += width;
        }
        true
    }
}
