//! The delta image: the parsed representation of one update.
//!
//! An update arrives as two blobs. The metadata delta (`dmeta`) carries
//! table-change records and heap additions behind a fixed header; the IL delta
//! (`dil`) is a headerless sequence of method bodies. [`DeltaImage::parse`]
//! decodes both into a fully owned structure with no references into the
//! inputs, which may be freed as soon as parsing returns.
//!
//! # Binary layout
//!
//! `dmeta`, all integers little-endian:
//!
//! | field                | size |
//! |----------------------|------|
//! | magic (`b"DMET"`)    | u32  |
//! | version (currently 1)| u32  |
//! | flags                | u32  |
//! | table change count   | u32  |
//! | heap addition count  | u32  |
//!
//! followed by table-change records `(table: u8, row: u32, len: u32,
//! payload: [u8; len])` and heap-addition records `(heap: u8, len: u32,
//! bytes: [u8; len])`.
//!
//! `dil`: `(token: u32, len: u32, il: [u8; len])` records to end of buffer.
//!
//! The image is transient: it is consumed by the merge engine and then
//! discarded. Nothing in a published generation points back into it.

mod reader;
mod writer;

pub use writer::DeltaWriter;

use bitflags::bitflags;

use crate::metadata::{heaps::HeapId, tables::TableId, token::Token};

/// Signature at the start of every metadata delta: the bytes `DMET`.
pub const DMETA_MAGIC: u32 = u32::from_le_bytes(*b"DMET");

/// Highest delta format version this engine understands.
pub const FORMAT_VERSION: u32 = 1;

bitflags! {
    /// Header flags of a metadata delta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeltaFlags: u32 {
        /// The delta's heap additions extend the previous generation's heaps
        /// rather than carrying complete replacement heaps.
        ///
        /// All version-1 producers emit minimal deltas; the flag exists so a
        /// future full-heap encoding stays distinguishable on disk.
        const MINIMAL_DELTA = 0x0000_0001;
    }
}

/// One row-level change: an add or a modify of a single table row.
///
/// Whether the record is an add or a modify is decided against the target
/// generation at merge time: `row == row_count + 1` adds, existing indices
/// modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    /// Table the change targets.
    pub table: TableId,
    /// 1-based row index within the table.
    pub row: u32,
    /// The complete new row payload.
    pub payload: Vec<u8>,
}

/// Bytes appended to one heap by this delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapAddition {
    /// Heap the bytes are appended to.
    pub heap: HeapId,
    /// The raw bytes; existing heap offsets are unaffected.
    pub bytes: Vec<u8>,
}

/// A replacement (or initial) IL body for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlBody {
    /// The `MethodDef` token whose body this is.
    pub token: Token,
    /// The raw IL bytes.
    pub il: Vec<u8>,
}

/// A fully decoded update, ready for the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaImage {
    /// Format version the delta was encoded with.
    pub version: u32,
    /// Header flags.
    pub flags: DeltaFlags,
    /// Row-level table changes, in record order.
    pub table_changes: Vec<TableChange>,
    /// Heap additions, in record order.
    pub heap_additions: Vec<HeapAddition>,
    /// Method bodies from the IL delta, in record order.
    pub il_bodies: Vec<IlBody>,
}

impl DeltaImage {
    /// `true` if the delta carries no changes at all.
    ///
    /// Empty deltas are rejected at merge time so that generation numbers are
    /// only consumed by updates that change something.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table_changes.is_empty() && self.heap_additions.is_empty() && self.il_bodies.is_empty()
    }
}
