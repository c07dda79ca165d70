//! Loaded modules and the update coordinator.
//!
//! A [`Module`] is a loaded unit of code with a stable identity, a baseline
//! body for every method it shipped with, and a forward-only history of
//! [`Generation`]s. [`Module::apply_update`] is the engine's public entry
//! point: it runs the full pipeline (serialize, parse, merge, publish) and on
//! any failure leaves the module exactly as it was.
//!
//! # Architecture
//!
//! ```text
//! caller -> Module::apply_update
//!             -> GenerationSequencer::begin_update   (serialize, Busy on contention)
//!             -> DeltaImage::parse                   (decode dmeta + dil)
//!             -> merge                               (shadow tables, never in place)
//!             -> PatchTable::with_overrides          (successor patch table)
//!             -> GenerationSequencer::commit         (single atomic publish)
//! ```
//!
//! Method dispatch goes through [`Module::resolve`], which reads the current
//! generation without taking a lock. A [`ModuleRegistry`] gives embedders a
//! statically-typed way to route an update to whichever module owns the
//! target metadata.

use std::{collections::HashMap, fmt, path::Path, sync::Arc};

use dashmap::DashMap;
use uguid::Guid;

use crate::{
    file::DeltaPair,
    metadata::{
        delta::DeltaImage,
        generation::{Generation, GenerationSequencer},
        heaps::{HeapId, HeapSet},
        merge::merge,
        patch::CodeBody,
        tables::{TableData, TableId, TableSet},
        token::Token,
    },
    Error, Result,
};

/// Stable identity of a loaded module: simple name plus MVID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    /// The module's simple name, e.g. `App.dll`.
    pub name: String,
    /// The module version id from the `#GUID` heap.
    pub mvid: Guid,
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mvid)
    }
}

/// A loaded module: baseline state plus its generation history.
///
/// All methods take `&self`; the module is designed to be shared across
/// threads behind an `Arc` while updates and dispatch happen concurrently.
pub struct Module {
    id: ModuleId,
    /// IL bodies the module shipped with, keyed by `MethodDef` token.
    /// Immutable after construction; generation 0 for every entry.
    original_bodies: HashMap<Token, Arc<[u8]>>,
    sequencer: GenerationSequencer,
}

impl Module {
    /// Start building a module from its baseline image.
    #[must_use]
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::new()
    }

    /// The module's identity.
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Number of the currently published generation (0 until the first
    /// successful update).
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.sequencer.current_number()
    }

    /// The currently published generation snapshot.
    ///
    /// Lock-free. The returned `Arc` pins the snapshot: it stays fully intact
    /// even if further updates are published while the caller holds it.
    #[must_use]
    pub fn current_generation(&self) -> Arc<Generation> {
        self.sequencer.current()
    }

    /// The IL body currently in effect for `token`.
    ///
    /// Consults the current generation's patch table first and falls back to
    /// the baseline body. Never takes a lock; two calls with no intervening
    /// commit return the identical body.
    ///
    /// # Errors
    /// [`Error::UnknownToken`] if the token is valid in no generation of this
    /// module. That is an invariant violation on the caller's side, never a
    /// reason to serve a stale or mixed body.
    pub fn resolve(&self, token: Token) -> Result<CodeBody> {
        let generation = self.sequencer.current();
        if let Some(body) = generation.patches.get(token) {
            return Ok(body);
        }
        match self.original_bodies.get(&token) {
            Some(il) => Ok(CodeBody::new(Arc::clone(il), 0)),
            None => Err(Error::UnknownToken(token)),
        }
    }

    /// Apply one metadata/IL delta pair, returning the new generation number.
    ///
    /// The pipeline is atomic end to end: on any failure the module is left
    /// exactly as before, and the error is tagged with the failing stage (see
    /// [`Error::stage`]). On success all subsequent [`Module::resolve`] calls
    /// observe the new bodies, while threads already holding a [`CodeBody`]
    /// keep running it to completion.
    ///
    /// # Errors
    /// [`Error::Busy`] while another update is in flight; [`Error::Parse`] and
    /// [`Error::Merge`] for rejected deltas; [`Error::Publish`] for the
    /// unreachable-by-design commit check.
    pub fn apply_update(&self, dmeta: &[u8], dil: &[u8]) -> Result<u32> {
        let ticket = self.sequencer.begin_update()?;
        log::info!(
            target: "dotpatch",
            "applying update to {} as generation {}",
            self.id,
            ticket.generation()
        );

        let delta = match DeltaImage::parse(dmeta, dil) {
            Ok(delta) => delta,
            Err(err) => {
                log::warn!(target: "dotpatch", "update for {} rejected at parse: {err}", self.id);
                self.sequencer.abort(ticket);
                return Err(err.into());
            }
        };
        log::debug!(
            target: "dotpatch",
            "delta for {}: {} table changes, {} heap additions, {} IL bodies",
            self.id,
            delta.table_changes.len(),
            delta.heap_additions.len(),
            delta.il_bodies.len()
        );

        let current = self.sequencer.current();
        let merged = match merge(&current.tables, &current.heaps, &delta) {
            Ok(merged) => merged,
            Err(err) => {
                log::warn!(target: "dotpatch", "update for {} rejected at merge: {err}", self.id);
                self.sequencer.abort(ticket);
                return Err(err.into());
            }
        };

        let patches = current
            .patches
            .with_overrides(&merged.body_overrides, ticket.generation());
        let generation = Generation {
            number: ticket.generation(),
            tables: merged.tables,
            heaps: merged.heaps,
            patches,
        };

        let number = self.sequencer.commit(ticket, generation)?;
        log::info!(target: "dotpatch", "published generation {number} for {}", self.id);
        Ok(number)
    }

    /// Apply the next update from co-located delta files.
    ///
    /// Maps `<assembly_path>.<N>.dmeta` and `<assembly_path>.<N>.dil`, where
    /// `N` is the current generation plus one, and applies them. The maps are
    /// released as soon as the delta is parsed.
    ///
    /// # Errors
    /// [`Error::FileError`] if the pair cannot be mapped, plus everything
    /// [`Module::apply_update`] reports.
    pub fn apply_update_from_files(&self, assembly_path: &Path) -> Result<u32> {
        let next = self.generation() + 1;
        let pair = DeltaPair::open(assembly_path, next)?;
        self.apply_update(pair.dmeta(), pair.dil())
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("generation", &self.generation())
            .field("original_bodies", &self.original_bodies.len())
            .finish()
    }
}

/// Builder for a module's baseline (generation 0) state.
///
/// # Examples
///
/// ```
/// use dotpatch::{Module, TableId, Token};
///
/// let module = Module::builder()
///     .name("App.dll")
///     .table_rows(TableId::MethodDef, vec![vec![0u8; 8]])
///     .method_body(Token::from_parts(TableId::MethodDef, 1), vec![0x00, 0x2A])
///     .build()?;
///
/// assert_eq!(module.generation(), 0);
/// # Ok::<(), dotpatch::Error>(())
/// ```
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    mvid: Guid,
    tables: Vec<(TableId, Vec<Vec<u8>>)>,
    heaps: Vec<(HeapId, Vec<u8>)>,
    bodies: Vec<(Token, Vec<u8>)>,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        ModuleBuilder::new()
    }
}

impl ModuleBuilder {
    /// An empty builder with a zero MVID.
    #[must_use]
    pub fn new() -> Self {
        ModuleBuilder {
            name: String::new(),
            mvid: Guid::ZERO,
            tables: Vec::new(),
            heaps: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Set the module's simple name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the module version id.
    #[must_use]
    pub fn mvid(mut self, mvid: Guid) -> Self {
        self.mvid = mvid;
        self
    }

    /// Provide the baseline rows of one table.
    #[must_use]
    pub fn table_rows(mut self, table: TableId, rows: Vec<Vec<u8>>) -> Self {
        self.tables.push((table, rows));
        self
    }

    /// Provide the baseline contents of one heap.
    #[must_use]
    pub fn heap(mut self, heap: HeapId, bytes: Vec<u8>) -> Self {
        self.heaps.push((heap, bytes));
        self
    }

    /// Provide the original IL body for a `MethodDef` token.
    #[must_use]
    pub fn method_body(mut self, token: Token, il: Vec<u8>) -> Self {
        self.bodies.push((token, il));
        self
    }

    /// Build the module with its baseline generation published.
    ///
    /// # Errors
    /// [`Error::UnknownToken`] if a method body was supplied for a token that
    /// is not a `MethodDef` token or has no row in the baseline tables.
    pub fn build(self) -> Result<Module> {
        let mut tables = TableSet::new();
        for (id, rows) in self.tables {
            tables.insert(id, Arc::new(TableData::from_rows(rows)));
        }

        let mut heaps = HeapSet::new();
        for (id, bytes) in self.heaps {
            heaps.append(id, Arc::from(bytes.as_slice()));
        }

        let method_rows = tables.row_count(TableId::MethodDef);
        let mut original_bodies = HashMap::with_capacity(self.bodies.len());
        for (token, il) in self.bodies {
            if !token.is_method() || token.row() == 0 || token.row() > method_rows {
                return Err(Error::UnknownToken(token));
            }
            original_bodies.insert(token, Arc::from(il.as_slice()));
        }

        Ok(Module {
            id: ModuleId {
                name: self.name,
                mvid: self.mvid,
            },
            original_bodies,
            sequencer: GenerationSequencer::new(Generation::baseline(tables, heaps)),
        })
    }
}

/// The embedder-facing routing table from module identity to live module.
///
/// Replaces name-based runtime discovery with a statically-typed capability:
/// whoever owns the registry can route `(module id, dmeta, dil)` straight to
/// the module that owns the metadata. All operations are safe under
/// concurrent registration, lookup and update.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: DashMap<ModuleId, Arc<Module>>,
}

impl ModuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        ModuleRegistry {
            modules: DashMap::new(),
        }
    }

    /// Register a module, returning the shared handle. A module registered
    /// under the same identity is replaced.
    pub fn register(&self, module: Module) -> Arc<Module> {
        let handle = Arc::new(module);
        self.modules
            .insert(handle.id().clone(), Arc::clone(&handle));
        handle
    }

    /// Look up a module by identity.
    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<Arc<Module>> {
        self.modules.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// `true` if no module is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Route a delta pair to the module that owns the target metadata.
    ///
    /// # Errors
    /// [`Error::ModuleNotFound`] if no module is registered under `id`, plus
    /// everything [`Module::apply_update`] reports.
    pub fn apply_update(&self, id: &ModuleId, dmeta: &[u8], dil: &[u8]) -> Result<u32> {
        let module = self
            .get(id)
            .ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
        module.apply_update(dmeta, dil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::delta::DeltaWriter;

    fn test_module() -> Module {
        Module::builder()
            .name("App.dll")
            .table_rows(TableId::MethodDef, vec![vec![0u8; 8], vec![1u8; 8]])
            .heap(HeapId::Strings, b"\0Main\0Calculate\0".to_vec())
            .method_body(Token::from_parts(TableId::MethodDef, 1), b"bodyA".to_vec())
            .method_body(Token::from_parts(TableId::MethodDef, 2), b"bodyM".to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_baseline_resolve() {
        let module = test_module();
        let token = Token::from_parts(TableId::MethodDef, 1);

        let body = module.resolve(token).unwrap();
        assert_eq!(body.il.as_ref(), b"bodyA");
        assert_eq!(body.generation, 0);
    }

    #[test]
    fn test_resolve_unknown_token() {
        let module = test_module();
        let missing = Token::from_parts(TableId::MethodDef, 99);
        assert!(matches!(
            module.resolve(missing).unwrap_err(),
            Error::UnknownToken(_)
        ));
    }

    #[test]
    fn test_builder_rejects_body_without_row() {
        let err = Module::builder()
            .table_rows(TableId::MethodDef, vec![vec![0u8; 8]])
            .method_body(Token::from_parts(TableId::MethodDef, 2), vec![0x2A])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownToken(_)));
    }

    #[test]
    fn test_builder_rejects_non_method_body() {
        let err = Module::builder()
            .table_rows(TableId::Field, vec![vec![0u8; 4]])
            .method_body(Token::from_parts(TableId::Field, 1), vec![0x2A])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownToken(_)));
    }

    #[test]
    fn test_apply_update_replaces_body() {
        let module = test_module();
        let token = Token::from_parts(TableId::MethodDef, 1);

        let (dmeta, dil) = DeltaWriter::new()
            .table_change(TableId::MethodDef, 1, vec![2u8; 8])
            .il_body(token, b"bodyB".to_vec())
            .finish();

        assert_eq!(module.apply_update(&dmeta, &dil).unwrap(), 1);
        assert_eq!(module.generation(), 1);

        let body = module.resolve(token).unwrap();
        assert_eq!(body.il.as_ref(), b"bodyB");
        assert_eq!(body.generation, 1);

        // The untouched method still serves its original body.
        let other = module
            .resolve(Token::from_parts(TableId::MethodDef, 2))
            .unwrap();
        assert_eq!(other.il.as_ref(), b"bodyM");
        assert_eq!(other.generation, 0);
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        let module = test_module();
        let token = Token::from_parts(TableId::MethodDef, 1);

        // Well-formed but semantically inapplicable: resizes an existing row.
        let (dmeta, dil) = DeltaWriter::new()
            .table_change(TableId::MethodDef, 1, vec![0u8; 2])
            .finish();

        let err = module.apply_update(&dmeta, &dil).unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Merge);
        assert_eq!(module.generation(), 0);
        assert_eq!(module.resolve(token).unwrap().il.as_ref(), b"bodyA");
    }

    #[test]
    fn test_parse_failure_keeps_generation() {
        let module = test_module();

        let err = module.apply_update(b"not a delta", &[]).unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Parse);
        assert_eq!(module.generation(), 0);

        // The reserved generation number was released; a valid update gets 1.
        let (dmeta, dil) = DeltaWriter::new()
            .il_body(Token::from_parts(TableId::MethodDef, 1), b"bodyB".to_vec())
            .finish();
        assert_eq!(module.apply_update(&dmeta, &dil).unwrap(), 1);
    }

    #[test]
    fn test_registry_routing() {
        let registry = ModuleRegistry::new();
        let handle = registry.register(test_module());
        let id = handle.id().clone();

        let (dmeta, dil) = DeltaWriter::new()
            .il_body(Token::from_parts(TableId::MethodDef, 1), b"bodyB".to_vec())
            .finish();

        assert_eq!(registry.apply_update(&id, &dmeta, &dil).unwrap(), 1);
        assert_eq!(handle.generation(), 1);

        let unknown = ModuleId {
            name: "Other.dll".into(),
            mvid: Guid::ZERO,
        };
        assert!(matches!(
            registry.apply_update(&unknown, &dmeta, &dil).unwrap_err(),
            Error::ModuleNotFound(_)
        ));
    }
}
