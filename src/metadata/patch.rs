//! The method body patch table.
//!
//! Every generation carries an immutable [`PatchTable`] mapping method tokens
//! to the IL body in effect for that token as of that generation. The table is
//! consulted on the method invocation path, so lookups are lock-free: the
//! entries live in a [`SkipMap`] that is populated once, while the generation
//! is still private to the updating thread, and only read after publication.
//!
//! A new generation's table is built from the previous one plus the incoming
//! overrides ([`PatchTable::with_overrides`]); the previous table is never
//! touched. A thread that fetched a [`CodeBody`] before the publish keeps
//! running that body to completion, because the body's storage is shared via
//! `Arc` and outlives the table that handed it out.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::metadata::token::Token;

/// The IL body in effect for one method token.
///
/// Cheap to clone; the IL bytes are shared. `generation` records which update
/// installed this body (0 for baseline bodies).
#[derive(Debug, Clone)]
pub struct CodeBody {
    /// The raw IL bytes.
    pub il: Arc<[u8]>,
    /// Generation that installed this body.
    pub generation: u32,
}

impl CodeBody {
    /// A body installed by `generation`.
    #[must_use]
    pub fn new(il: Arc<[u8]>, generation: u32) -> Self {
        CodeBody { il, generation }
    }
}

/// An immutable token-to-body snapshot for one generation.
///
/// Absent entries mean "use the original body". The table is frozen after
/// construction; concurrent readers share it through the owning generation's
/// `Arc` and never observe partial state.
#[derive(Debug, Default)]
pub struct PatchTable {
    entries: SkipMap<Token, CodeBody>,
}

impl PatchTable {
    /// The empty table of generation 0.
    #[must_use]
    pub fn empty() -> Self {
        PatchTable {
            entries: SkipMap::new(),
        }
    }

    /// Build the successor table: this table's entries plus `overrides`, with
    /// the overrides winning on token conflicts.
    #[must_use]
    pub fn with_overrides(&self, overrides: &[(Token, Arc<[u8]>)], generation: u32) -> PatchTable {
        let entries = SkipMap::new();
        for entry in self.entries.iter() {
            entries.insert(*entry.key(), entry.value().clone());
        }
        for (token, il) in overrides {
            entries.insert(*token, CodeBody::new(il.clone(), generation));
        }
        PatchTable { entries }
    }

    /// The body in effect for `token`, if any generation patched it.
    #[must_use]
    pub fn get(&self, token: Token) -> Option<CodeBody> {
        self.entries.get(&token).map(|entry| entry.value().clone())
    }

    /// Number of tokens that have ever been patched as of this generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no token has been patched yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
