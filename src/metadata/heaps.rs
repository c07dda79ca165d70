//! Append-only metadata heaps.
//!
//! Heap entries referenced by table rows (names, signatures, GUIDs, string
//! literals) are addressed by byte offset. Deltas may only append to a heap,
//! never rewrite it, so every offset handed out in an earlier generation stays
//! valid forever.
//!
//! To avoid copying whole heaps on every small delta, a heap is a list of
//! immutable segments: the next generation shares all previous segments via
//! `Arc` and appends the delta's additions as new segments. Offsets are
//! logical positions across the concatenation of all segments.

use std::sync::Arc;

use strum::{EnumCount, EnumIter, FromRepr};

/// Identifiers for the four metadata heaps carried in delta images.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount, FromRepr)]
#[repr(u8)]
pub enum HeapId {
    /// `#Strings` (0x00) - UTF-8, nul-terminated identifier names.
    Strings = 0x00,
    /// `#US` (0x01) - user string literals referenced by IL.
    UserStrings = 0x01,
    /// `#Blob` (0x02) - signatures and other variable-length binary data.
    Blob = 0x02,
    /// `#GUID` (0x03) - 16-byte GUIDs, notably the module MVID.
    Guid = 0x03,
}

/// One append-only heap: a sequence of immutable segments.
#[derive(Debug, Clone, Default)]
pub struct HeapData {
    segments: Vec<Arc<[u8]>>,
    len: u32,
}

impl HeapData {
    /// An empty heap.
    #[must_use]
    pub fn new() -> Self {
        HeapData {
            segments: Vec::new(),
            len: 0,
        }
    }

    /// A heap seeded with one initial segment (the baseline image's heap).
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let mut heap = HeapData::new();
        heap.append(bytes.into());
        heap
    }

    /// Total logical length across all segments.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// `true` if the heap holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a segment, returning the offset at which it starts.
    pub(crate) fn append(&mut self, bytes: Arc<[u8]>) -> u32 {
        let offset = self.len;
        self.len += bytes.len() as u32;
        self.segments.push(bytes);
        offset
    }

    /// The bytes from `offset` to the end of the segment containing it.
    ///
    /// Heap entries never span segments (each addition is appended whole), so
    /// the tail of the containing segment always covers the entry that starts
    /// at `offset`. Returns `None` if `offset` lies past the end of the heap.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&[u8]> {
        let mut start = 0u32;
        for segment in &self.segments {
            let end = start + segment.len() as u32;
            if offset < end {
                return Some(&segment[(offset - start) as usize..]);
            }
            start = end;
        }
        None
    }
}

/// The heap state of one generation. Cloning shares all segments.
#[derive(Debug, Clone, Default)]
pub struct HeapSet {
    strings: HeapData,
    userstrings: HeapData,
    blob: HeapData,
    guid: HeapData,
}

impl HeapSet {
    /// An empty heap set.
    #[must_use]
    pub fn new() -> Self {
        HeapSet::default()
    }

    /// The heap with the given id.
    #[must_use]
    pub fn heap(&self, id: HeapId) -> &HeapData {
        match id {
            HeapId::Strings => &self.strings,
            HeapId::UserStrings => &self.userstrings,
            HeapId::Blob => &self.blob,
            HeapId::Guid => &self.guid,
        }
    }

    /// Append a segment to the heap with the given id, returning the offset at
    /// which it starts.
    pub(crate) fn append(&mut self, id: HeapId, bytes: Arc<[u8]>) -> u32 {
        let heap = match id {
            HeapId::Strings => &mut self.strings,
            HeapId::UserStrings => &mut self.userstrings,
            HeapId::Blob => &mut self.blob,
            HeapId::Guid => &mut self.guid,
        };
        heap.append(bytes)
    }

    /// Read a nul-terminated UTF-8 string from the `#Strings` heap.
    ///
    /// Returns `None` for out-of-range offsets, missing terminators, or
    /// invalid UTF-8.
    #[must_use]
    pub fn string_at(&self, offset: u32) -> Option<&str> {
        let tail = self.strings.get(offset)?;
        let end = tail.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }
}
