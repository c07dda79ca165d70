//! Decoding of the dmeta/dil blob pair into a [`DeltaImage`].

use crate::{
    error::ParseError,
    file::parser::Parser,
    metadata::{
        delta::{
            DeltaFlags, DeltaImage, HeapAddition, IlBody, TableChange, DMETA_MAGIC, FORMAT_VERSION,
        },
        heaps::HeapId,
        tables::TableId,
        token::Token,
    },
};

impl DeltaImage {
    /// Parse a metadata delta and its companion IL delta.
    ///
    /// Validates the header, decodes every record, and copies all payloads
    /// into owned storage. Both input buffers may be freed once this returns.
    ///
    /// # Errors
    /// - [`ParseError::BadMagic`] if the dmeta signature is wrong
    /// - [`ParseError::UnsupportedVersion`] if the version exceeds
    ///   [`FORMAT_VERSION`]
    /// - [`ParseError::Truncated`] if any declared length runs past either
    ///   buffer
    /// - [`ParseError::UnknownTable`] / [`ParseError::UnknownHeap`] /
    ///   [`ParseError::UnknownFlags`] for ids and flag bits outside the
    ///   defined sets
    pub fn parse(dmeta: &[u8], dil: &[u8]) -> Result<DeltaImage, ParseError> {
        let mut parser = Parser::new(dmeta);

        let magic = parser.read_le::<u32>()?;
        if magic != DMETA_MAGIC {
            return Err(ParseError::BadMagic {
                expected: DMETA_MAGIC,
                found: magic,
            });
        }

        let version = parser.read_le::<u32>()?;
        if version > FORMAT_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        let raw_flags = parser.read_le::<u32>()?;
        let flags =
            DeltaFlags::from_bits(raw_flags).ok_or(ParseError::UnknownFlags(raw_flags))?;

        let table_change_count = parser.read_le::<u32>()?;
        let heap_addition_count = parser.read_le::<u32>()?;

        let mut table_changes = Vec::with_capacity(table_change_count.min(1024) as usize);
        for _ in 0..table_change_count {
            table_changes.push(read_table_change(&mut parser)?);
        }

        let mut heap_additions = Vec::with_capacity(heap_addition_count.min(1024) as usize);
        for _ in 0..heap_addition_count {
            heap_additions.push(read_heap_addition(&mut parser)?);
        }

        let il_bodies = parse_il(dil)?;

        Ok(DeltaImage {
            version,
            flags,
            table_changes,
            heap_additions,
            il_bodies,
        })
    }
}

fn read_table_change(parser: &mut Parser<'_>) -> Result<TableChange, ParseError> {
    let table_id = parser.read_le::<u8>()?;
    let table = TableId::from_repr(table_id).ok_or(ParseError::UnknownTable(table_id))?;
    let row = parser.read_le::<u32>()?;
    let len = parser.read_le::<u32>()? as usize;
    let payload = parser.bytes(len)?.to_vec();
    Ok(TableChange {
        table,
        row,
        payload,
    })
}

fn read_heap_addition(parser: &mut Parser<'_>) -> Result<HeapAddition, ParseError> {
    let heap_id = parser.read_le::<u8>()?;
    let heap = HeapId::from_repr(heap_id).ok_or(ParseError::UnknownHeap(heap_id))?;
    let len = parser.read_le::<u32>()? as usize;
    let bytes = parser.bytes(len)?.to_vec();
    Ok(HeapAddition { heap, bytes })
}

/// The IL delta is headerless: records run to the end of the buffer.
fn parse_il(dil: &[u8]) -> Result<Vec<IlBody>, ParseError> {
    let mut parser = Parser::new(dil);
    let mut bodies = Vec::new();
    while parser.has_more() {
        let token = Token::new(parser.read_le::<u32>()?);
        let len = parser.read_le::<u32>()? as usize;
        let il = parser.bytes(len)?.to_vec();
        bodies.push(IlBody { token, il });
    }
    Ok(bodies)
}
