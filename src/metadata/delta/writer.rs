//! Encoding of a change set into the dmeta/dil blob pair.
//!
//! The writer is the producer-side counterpart of [`DeltaImage::parse`]; the
//! engine itself only consumes deltas, but toolchains and tests need to emit
//! them, and keeping encoder and decoder next to each other keeps the format
//! honest in both directions.

use crate::{
    file::io::put_le,
    metadata::{
        delta::{DeltaFlags, DeltaImage, DMETA_MAGIC, FORMAT_VERSION},
        heaps::HeapId,
        tables::TableId,
        token::Token,
    },
};

/// Builder for a dmeta/dil pair.
///
/// # Examples
///
/// ```
/// use dotpatch::{DeltaImage, DeltaWriter, TableId, Token};
///
/// let (dmeta, dil) = DeltaWriter::new()
///     .table_change(TableId::MethodDef, 1, vec![0u8; 8])
///     .il_body(Token::new(0x06000001), vec![0x00, 0x2A])
///     .finish();
///
/// let image = DeltaImage::parse(&dmeta, &dil)?;
/// assert_eq!(image.table_changes.len(), 1);
/// # Ok::<(), dotpatch::ParseError>(())
/// ```
#[derive(Debug)]
pub struct DeltaWriter {
    flags: DeltaFlags,
    table_changes: Vec<(TableId, u32, Vec<u8>)>,
    heap_additions: Vec<(HeapId, Vec<u8>)>,
    il_bodies: Vec<(Token, Vec<u8>)>,
}

impl Default for DeltaWriter {
    fn default() -> Self {
        DeltaWriter::new()
    }
}

impl DeltaWriter {
    /// A writer for an empty minimal delta.
    #[must_use]
    pub fn new() -> Self {
        DeltaWriter {
            flags: DeltaFlags::MINIMAL_DELTA,
            table_changes: Vec::new(),
            heap_additions: Vec::new(),
            il_bodies: Vec::new(),
        }
    }

    /// Replace the header flags.
    #[must_use]
    pub fn flags(mut self, flags: DeltaFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Record a row add or modify for `table` at 1-based index `row`.
    #[must_use]
    pub fn table_change(mut self, table: TableId, row: u32, payload: Vec<u8>) -> Self {
        self.table_changes.push((table, row, payload));
        self
    }

    /// Record bytes to append to `heap`.
    #[must_use]
    pub fn heap_addition(mut self, heap: HeapId, bytes: Vec<u8>) -> Self {
        self.heap_additions.push((heap, bytes));
        self
    }

    /// Record a replacement IL body for `token`.
    #[must_use]
    pub fn il_body(mut self, token: Token, il: Vec<u8>) -> Self {
        self.il_bodies.push((token, il));
        self
    }

    /// Encode the accumulated changes as `(dmeta, dil)` byte blobs.
    #[must_use]
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        let mut dmeta = Vec::new();
        put_le(&mut dmeta, DMETA_MAGIC);
        put_le(&mut dmeta, FORMAT_VERSION);
        put_le(&mut dmeta, self.flags.bits());
        put_le(&mut dmeta, self.table_changes.len() as u32);
        put_le(&mut dmeta, self.heap_additions.len() as u32);

        for (table, row, payload) in &self.table_changes {
            put_le(&mut dmeta, *table as u8);
            put_le(&mut dmeta, *row);
            put_le(&mut dmeta, payload.len() as u32);
            dmeta.extend_from_slice(payload);
        }

        for (heap, bytes) in &self.heap_additions {
            put_le(&mut dmeta, *heap as u8);
            put_le(&mut dmeta, bytes.len() as u32);
            dmeta.extend_from_slice(bytes);
        }

        let mut dil = Vec::new();
        for (token, il) in &self.il_bodies {
            put_le(&mut dil, token.value());
            put_le(&mut dil, il.len() as u32);
            dil.extend_from_slice(il);
        }

        (dmeta, dil)
    }
}
