//! Metadata tables and the per-generation table set.
//!
//! Tables are stored as opaque fixed-width rows: this engine merges and
//! republishes rows, it does not decode their columns. Each generation owns a
//! [`TableSet`]; producing the next generation shares storage with the
//! previous one at two levels:
//!
//! - tables untouched by a delta share the whole [`TableData`] via `Arc`
//! - touched tables are cloned at row granularity, so unmodified rows remain
//!   shared `Arc<[u8]>` allocations
//!
//! A published `TableSet` is never mutated. All merge work happens on a
//! private copy that becomes visible only through the generation publish.

use std::{collections::BTreeMap, sync::Arc};

use strum::{EnumCount, EnumIter, FromRepr};

/// Identifiers for the metadata tables defined in ECMA-335 Partition II.
///
/// The numeric values are the table ids used in token high bytes and in
/// table-change records of the delta format.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, EnumIter, EnumCount, FromRepr)]
#[repr(u8)]
pub enum TableId {
    /// `Module` (0x00) - the module itself: name, MVID, generation info.
    Module = 0x00,
    /// `TypeRef` (0x01) - references to types in external assemblies.
    TypeRef = 0x01,
    /// `TypeDef` (0x02) - type definitions within this module.
    TypeDef = 0x02,
    /// `Field` (0x04) - field definitions.
    Field = 0x04,
    /// `MethodDef` (0x06) - method definitions; the only table whose rows can
    /// carry IL bodies in a delta.
    MethodDef = 0x06,
    /// `Param` (0x08) - method parameter definitions.
    Param = 0x08,
    /// `InterfaceImpl` (0x09) - interface implementations.
    InterfaceImpl = 0x09,
    /// `MemberRef` (0x0A) - references to external members.
    MemberRef = 0x0A,
    /// `Constant` (0x0B) - compile-time constant values.
    Constant = 0x0B,
    /// `CustomAttribute` (0x0C) - custom attribute applications.
    CustomAttribute = 0x0C,
    /// `FieldMarshal` (0x0D) - P/Invoke marshalling information.
    FieldMarshal = 0x0D,
    /// `DeclSecurity` (0x0E) - declarative security permissions.
    DeclSecurity = 0x0E,
    /// `ClassLayout` (0x0F) - explicit type layout.
    ClassLayout = 0x0F,
    /// `FieldLayout` (0x10) - explicit field offsets.
    FieldLayout = 0x10,
    /// `StandAloneSig` (0x11) - standalone signatures.
    StandAloneSig = 0x11,
    /// `EventMap` (0x12) - type-to-event mappings.
    EventMap = 0x12,
    /// `Event` (0x14) - event definitions.
    Event = 0x14,
    /// `PropertyMap` (0x15) - type-to-property mappings.
    PropertyMap = 0x15,
    /// `Property` (0x17) - property definitions.
    Property = 0x17,
    /// `MethodSemantics` (0x18) - accessor mappings.
    MethodSemantics = 0x18,
    /// `MethodImpl` (0x19) - method implementation mappings.
    MethodImpl = 0x19,
    /// `ModuleRef` (0x1A) - external module references.
    ModuleRef = 0x1A,
    /// `TypeSpec` (0x1B) - generic type specifications.
    TypeSpec = 0x1B,
    /// `ImplMap` (0x1C) - P/Invoke implementation mappings.
    ImplMap = 0x1C,
    /// `FieldRVA` (0x1D) - field data addresses.
    FieldRVA = 0x1D,
    /// `EncLog` (0x1E) - Edit-and-Continue operation log.
    EncLog = 0x1E,
    /// `EncMap` (0x1F) - Edit-and-Continue token remapping.
    EncMap = 0x1F,
    /// `Assembly` (0x20) - assembly manifest.
    Assembly = 0x20,
    /// `AssemblyProcessor` (0x21).
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` (0x22).
    AssemblyOS = 0x22,
    /// `AssemblyRef` (0x23) - external assembly references.
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` (0x24).
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` (0x25).
    AssemblyRefOS = 0x25,
    /// `File` (0x26) - files in the assembly.
    File = 0x26,
    /// `ExportedType` (0x27) - types exported from this assembly.
    ExportedType = 0x27,
    /// `ManifestResource` (0x28) - embedded or linked resources.
    ManifestResource = 0x28,
    /// `NestedClass` (0x29) - nested class relationships.
    NestedClass = 0x29,
    /// `GenericParam` (0x2A) - generic parameter definitions.
    GenericParam = 0x2A,
    /// `MethodSpec` (0x2B) - generic method instantiations.
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` (0x2C) - generic parameter constraints.
    GenericParamConstraint = 0x2C,
}

/// The rows of one metadata table within one generation.
///
/// Rows are opaque byte payloads shared between generations via `Arc`. Row
/// indices are 1-based throughout, matching the token encoding.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    rows: Vec<Arc<[u8]>>,
}

impl TableData {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        TableData { rows: Vec::new() }
    }

    /// Build a table from raw row payloads.
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Arc<[u8]>>,
    {
        TableData {
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of rows currently in the table.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// The row at 1-based index `rid`, if present.
    #[must_use]
    pub fn row(&self, rid: u32) -> Option<&Arc<[u8]>> {
        if rid == 0 {
            return None;
        }
        self.rows.get((rid - 1) as usize)
    }

    /// Row width in bytes, established by the first row.
    ///
    /// `None` for an empty table; the first added row fixes the width.
    #[must_use]
    pub fn row_width(&self) -> Option<usize> {
        self.rows.first().map(|row| row.len())
    }

    /// Append a row, returning its new 1-based index.
    pub(crate) fn push_row(&mut self, payload: Arc<[u8]>) -> u32 {
        self.rows.push(payload);
        self.rows.len() as u32
    }

    /// Replace the row at 1-based index `rid`. The index must be valid.
    pub(crate) fn set_row(&mut self, rid: u32, payload: Arc<[u8]>) {
        self.rows[(rid - 1) as usize] = payload;
    }
}

/// The complete table state of one generation.
///
/// Cloning a `TableSet` is cheap: it copies one `Arc` per table.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: BTreeMap<TableId, Arc<TableData>>,
}

impl TableSet {
    /// An empty table set.
    #[must_use]
    pub fn new() -> Self {
        TableSet {
            tables: BTreeMap::new(),
        }
    }

    /// The table with the given id, if the module has it.
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&Arc<TableData>> {
        self.tables.get(&id)
    }

    /// Row count of the given table; 0 if the table is absent.
    #[must_use]
    pub fn row_count(&self, id: TableId) -> u32 {
        self.tables.get(&id).map_or(0, |t| t.row_count())
    }

    /// The row behind `(id, rid)`, if present.
    #[must_use]
    pub fn row(&self, id: TableId, rid: u32) -> Option<&Arc<[u8]>> {
        self.tables.get(&id).and_then(|t| t.row(rid))
    }

    /// Number of tables present.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Install or replace a table.
    pub(crate) fn insert(&mut self, id: TableId, data: Arc<TableData>) {
        self.tables.insert(id, data);
    }

    /// Iterate over the tables in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TableId, &Arc<TableData>)> {
        self.tables.iter().map(|(id, data)| (*id, data))
    }
}
