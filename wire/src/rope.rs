//! An immutable, structurally-shared byte sequence.
//!
//! A [Rope] is either a leaf (a [Bytes] view of contiguous storage) or a concatenation of two
//! ropes. Nodes are never mutated: concatenation and slicing build new nodes that share unchanged
//! subtrees with their inputs, so cloning and slicing never copy leaf storage.
//!
//! # Balance
//!
//! Every rope satisfies `len >= MIN_LENGTH_BY_DEPTH[depth]`, where the table follows the
//! Fibonacci sequence (`1, 2, 3, 5, 8, ...`). When a concatenation or slice would produce a node
//! violating this bound, the affected tree is rebuilt. Depth is therefore logarithmic in length
//! regardless of how a rope was assembled.
//!
//! # Equality
//!
//! Equality, ordering and hashing only consider content: two ropes holding the same bytes are
//! equal (and hash identically) no matter how their trees are shaped.

use crate::{utf8, varint, EncodeSize, Error, Read, Write};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};
use tracing::trace;

/// Concatenations shorter than this copy both sides into a single leaf.
const CONCATENATE_BY_COPY_SIZE: usize = 128;

/// Number of entries in [MIN_LENGTH_BY_DEPTH].
const DEPTHS: usize = 96;

/// The minimum length of a balanced rope of each depth (saturating at `usize::MAX`).
static MIN_LENGTH_BY_DEPTH: [usize; DEPTHS] = min_length_by_depth();

const fn min_length_by_depth() -> [usize; DEPTHS] {
    let mut table = [usize::MAX; DEPTHS];
    table[0] = 1;
    table[1] = 2;
    let mut i = 2;
    while i < DEPTHS {
        table[i] = table[i - 1].saturating_add(table[i - 2]);
        i += 1;
    }
    table
}

/// Returns whether a node of `len` bytes may have depth `depth`.
fn is_balanced(len: usize, depth: usize) -> bool {
    depth == 0 || (depth < DEPTHS && len >= MIN_LENGTH_BY_DEPTH[depth])
}

enum Node {
    Leaf(Bytes),
    Concat {
        left: Rope,
        right: Rope,
        len: usize,
        depth: usize,
    },
}

struct Inner {
    node: Node,

    /// Content hash, computed on first use.
    hash: OnceLock<u32>,

    /// Decoded text, or `None` if the content is not valid UTF-8.
    text: OnceLock<Option<Box<str>>>,
}

/// An immutable byte sequence built from shared leaves.
#[derive(Clone)]
pub struct Rope {
    inner: Arc<Inner>,
}

impl Rope {
    fn from_node(node: Node) -> Self {
        Self {
            inner: Arc::new(Inner {
                node,
                hash: OnceLock::new(),
                text: OnceLock::new(),
            }),
        }
    }

    /// Joins two non-empty ropes without copying and without checking balance.
    fn branch(left: Rope, right: Rope) -> Self {
        let len = left.len() + right.len();
        let depth = left.depth().max(right.depth()) + 1;
        Self::from_node(Node::Concat {
            left,
            right,
            len,
            depth,
        })
    }

    /// Returns an empty rope.
    pub fn new() -> Self {
        Self::from_node(Node::Leaf(Bytes::new()))
    }

    /// Creates a rope over static bytes.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(bytes))
    }

    /// Creates a balanced rope from a sequence of chunks (in order).
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        let leaves: Vec<Rope> = chunks
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .map(Rope::from)
            .collect();
        if leaves.is_empty() {
            return Self::new();
        }
        Self::build_balanced(&leaves)
    }

    /// Returns the number of bytes in the rope.
    pub fn len(&self) -> usize {
        match &self.inner.node {
            Node::Leaf(bytes) => bytes.len(),
            Node::Concat { len, .. } => *len,
        }
    }

    /// Returns whether the rope is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the depth of the tree (0 for a leaf).
    pub fn depth(&self) -> usize {
        match &self.inner.node {
            Node::Leaf(_) => 0,
            Node::Concat { depth, .. } => *depth,
        }
    }

    /// Returns whether the rope satisfies the Fibonacci depth bound.
    pub fn is_balanced(&self) -> bool {
        is_balanced(self.len(), self.depth())
    }

    /// Returns the concatenation of `self` and `other`.
    ///
    /// Short results are copied into a single leaf. Otherwise a new node shares both inputs,
    /// rebuilding the tree if the result would be too deep for its length.
    pub fn concat(&self, other: &Rope) -> Rope {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let len = self.len() + other.len();
        if len < CONCATENATE_BY_COPY_SIZE {
            return Self::copy_pair(self, other);
        }

        let candidate = match &self.inner.node {
            // Appending a short piece to a node whose right side is short: copy the two short
            // pieces together so the depth does not grow.
            Node::Concat { left, right, .. }
                if right.len() + other.len() < CONCATENATE_BY_COPY_SIZE =>
            {
                Self::branch(left.clone(), Self::copy_pair(right, other))
            }

            // Left-deep trees (typical of repeated appends) absorb the new piece on the right.
            Node::Concat { left, right, depth, .. }
                if left.depth() > right.depth() && *depth > other.depth() =>
            {
                Self::branch(left.clone(), Self::branch(right.clone(), other.clone()))
            }
            _ => Self::branch(self.clone(), other.clone()),
        };
        if candidate.is_balanced() {
            return candidate;
        }

        trace!(
            len,
            depth = candidate.depth(),
            "rebalancing rope after concatenation"
        );
        Self::rebalance(&candidate)
    }

    /// Returns the bytes in `start..end` without copying leaf storage.
    ///
    /// Panics if the range is out of bounds.
    pub fn substring(&self, start: usize, end: usize) -> Rope {
        assert!(
            start <= end && end <= self.len(),
            "range {start}..{end} out of bounds for rope of length {}",
            self.len()
        );
        if start == 0 && end == self.len() {
            return self.clone();
        }
        if start == end {
            return Self::new();
        }

        match &self.inner.node {
            Node::Leaf(bytes) => Self::from(bytes.slice(start..end)),
            Node::Concat { left, right, .. } => {
                let split = left.len();
                if end <= split {
                    return left.substring(start, end);
                }
                if start >= split {
                    return right.substring(start - split, end - split);
                }
                let joined = Self::branch(
                    left.substring(start, split),
                    right.substring(0, end - split),
                );
                if joined.is_balanced() {
                    joined
                } else {
                    Self::rebalance(&joined)
                }
            }
        }
    }

    /// Returns the byte at `index`, if any.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        let mut node = self;
        let mut index = index;
        loop {
            match &node.inner.node {
                Node::Leaf(bytes) => return bytes.get(index).copied(),
                Node::Concat { left, right, .. } => {
                    if index < left.len() {
                        node = left;
                    } else {
                        index -= left.len();
                        node = right;
                    }
                }
            }
        }
    }

    /// Iterates over the non-empty leaves of the rope, in order.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks { stack: vec![self] }
    }

    /// Iterates over the bytes of the rope.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks().flat_map(|chunk| chunk.iter().copied())
    }

    /// Returns the content as a contiguous [Bytes], copying only if the rope has more than one
    /// leaf.
    pub fn to_bytes(&self) -> Bytes {
        if let Node::Leaf(bytes) = &self.inner.node {
            return bytes.clone();
        }
        let mut out = BytesMut::with_capacity(self.len());
        for chunk in self.chunks() {
            out.put_slice(chunk);
        }
        out.freeze()
    }

    /// Copies the content into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Returns a [Buf] over the content.
    pub fn reader(&self) -> RopeReader {
        RopeReader::new(self)
    }

    /// Returns whether the content is valid UTF-8, without copying it into one buffer.
    pub fn is_valid_utf8(&self) -> bool {
        if let Some(text) = self.inner.text.get() {
            return text.is_some();
        }
        let mut state = utf8::State::START;
        for chunk in self.chunks() {
            state = utf8::portable::partial(state, chunk);
            if state.is_rejected() {
                return false;
            }
        }
        state.is_complete()
    }

    /// Decodes the content as UTF-8 text.
    ///
    /// The decoded text is cached on the node, so repeated calls are cheap.
    pub fn to_str(&self) -> Result<&str, Error> {
        self.inner
            .text
            .get_or_init(|| self.decode_text())
            .as_deref()
            .ok_or(Error::InvalidUtf8)
    }

    /// Decodes the content as UTF-8 text, replacing invalid sequences with `U+FFFD`.
    pub fn to_string_lossy(&self) -> String {
        match self.to_str() {
            Ok(text) => text.to_owned(),
            Err(_) => String::from_utf8_lossy(&self.to_bytes()).into_owned(),
        }
    }

    fn decode_text(&self) -> Option<Box<str>> {
        if !self.is_valid_utf8() {
            return None;
        }
        String::from_utf8(self.to_vec())
            .ok()
            .map(String::into_boxed_str)
    }

    /// Returns the content hash (structure independent).
    fn content_hash(&self) -> u32 {
        *self.inner.hash.get_or_init(|| {
            let mut h = self.len() as u32;
            for byte in self.bytes() {
                h = h.wrapping_mul(31).wrapping_add(byte as u32);
            }
            // Zero is reserved for "not yet computed" in other implementations of this hash.
            if h == 0 {
                1
            } else {
                h
            }
        })
    }

    /// Copies two short ropes into a single leaf.
    fn copy_pair(left: &Rope, right: &Rope) -> Rope {
        let mut out = BytesMut::with_capacity(left.len() + right.len());
        for chunk in left.chunks().chain(right.chunks()) {
            out.put_slice(chunk);
        }
        Self::from(out.freeze())
    }

    /// Rebuilds a rope as a tree with the minimum possible depth over its leaves.
    fn rebalance(rope: &Rope) -> Rope {
        let leaves: Vec<Rope> = rope.leaves().collect();
        Self::build_balanced(&leaves)
    }

    /// Builds a tree of depth `ceil(log2(n))` over `n` non-empty leaves. Since every leaf holds
    /// at least one byte, the result always satisfies the depth bound.
    fn build_balanced(leaves: &[Rope]) -> Rope {
        match leaves {
            [] => Self::new(),
            [leaf] => leaf.clone(),
            _ => {
                let mid = leaves.len() / 2;
                Self::branch(
                    Self::build_balanced(&leaves[..mid]),
                    Self::build_balanced(&leaves[mid..]),
                )
            }
        }
    }

    /// Iterates over the leaf nodes of the rope.
    fn leaves(&self) -> impl Iterator<Item = Rope> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match &node.inner.node {
                    Node::Leaf(bytes) if bytes.is_empty() => continue,
                    Node::Leaf(_) => return Some(node.clone()),
                    Node::Concat { left, right, .. } => {
                        stack.push(right);
                        stack.push(left);
                    }
                }
            }
            None
        })
    }
}

impl Default for Rope {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Bytes> for Rope {
    fn from(bytes: Bytes) -> Self {
        Self::from_node(Node::Leaf(bytes))
    }
}

impl From<Vec<u8>> for Rope {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<&str> for Rope {
    fn from(text: &str) -> Self {
        Self::from(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<String> for Rope {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&[u8]> for Rope {
    fn from(bytes: &[u8]) -> Self {
        Self::from(Bytes::copy_from_slice(bytes))
    }
}

impl PartialEq for Rope {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.inner.hash.get(), other.inner.hash.get()) {
            if a != b {
                return false;
            }
        }
        self.bytes().eq(other.bytes())
    }
}

impl Eq for Rope {}

impl PartialEq<[u8]> for Rope {
    fn eq(&self, other: &[u8]) -> bool {
        self.len() == other.len() && self.bytes().eq(other.iter().copied())
    }
}

impl PartialEq<&[u8]> for Rope {
    fn eq(&self, other: &&[u8]) -> bool {
        self == *other
    }
}

impl PartialOrd for Rope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rope {
    /// Lexicographic comparison of unsigned bytes.
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(other.bytes())
    }
}

impl Hash for Rope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.content_hash());
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 32;
        let preview: Vec<u8> = self.bytes().take(PREVIEW).collect();
        f.debug_struct("Rope")
            .field("len", &self.len())
            .field("depth", &self.depth())
            .field("bytes", &format_args!("{preview:02x?}"))
            .finish()
    }
}

impl Write for Rope {
    fn write(&self, buf: &mut impl BufMut) {
        varint::write(self.len() as u64, buf);
        for chunk in self.chunks() {
            buf.put_slice(chunk);
        }
    }
}

impl EncodeSize for Rope {
    fn encode_size(&self) -> usize {
        varint::size(self.len() as u64) + self.len()
    }
}

impl Read for Rope {
    /// Reads a length-prefixed rope.
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = varint::read(buf)?;
        if len > i32::MAX as u64 {
            return Err(Error::MalformedLength(len));
        }
        let len = len as usize;
        if len > buf.remaining() {
            return Err(Error::TruncatedMessage);
        }
        Ok(Self::from(buf.copy_to_bytes(len)))
    }
}

/// Iterator over the leaves of a [Rope].
pub struct Chunks<'a> {
    stack: Vec<&'a Rope>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match &node.inner.node {
                Node::Leaf(bytes) if bytes.is_empty() => continue,
                Node::Leaf(bytes) => return Some(bytes),
                Node::Concat { left, right, .. } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
        None
    }
}

/// A [Buf] that walks the leaves of a [Rope].
///
/// Reading a range that lies within a single leaf via [Buf::copy_to_bytes] shares the leaf's
/// storage instead of copying.
pub struct RopeReader {
    current: Bytes,
    pending: Vec<Rope>,
    remaining: usize,
}

impl RopeReader {
    fn new(rope: &Rope) -> Self {
        let mut reader = Self {
            current: Bytes::new(),
            pending: vec![rope.clone()],
            remaining: rope.len(),
        };
        reader.next_leaf();
        reader
    }

    /// Moves to the next non-empty leaf once the current one is exhausted.
    fn next_leaf(&mut self) {
        while self.current.is_empty() {
            let Some(node) = self.pending.pop() else {
                return;
            };
            match &node.inner.node {
                Node::Leaf(bytes) => self.current = bytes.clone(),
                Node::Concat { left, right, .. } => {
                    self.pending.push(right.clone());
                    self.pending.push(left.clone());
                }
            }
        }
    }
}

impl Buf for RopeReader {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn chunk(&self) -> &[u8] {
        &self.current
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(cnt <= self.remaining, "cannot advance past end of rope");
        self.remaining -= cnt;
        while cnt > 0 {
            let step = cnt.min(self.current.len());
            self.current.advance(step);
            cnt -= step;
            self.next_leaf();
        }
    }

    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        assert!(len <= self.remaining, "cannot advance past end of rope");
        if len <= self.current.len() {
            let out = self.current.split_to(len);
            self.remaining -= len;
            self.next_leaf();
            return out;
        }
        let mut out = BytesMut::with_capacity(len);
        out.put((&mut *self).take(len));
        out.freeze()
    }
}
