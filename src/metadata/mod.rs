//! Metadata model and the delta application pipeline.
//!
//! Everything the engine knows about a module lives here: tokens and tables,
//! append-only heaps, the decoded delta image, the merge engine that turns a
//! delta into the next generation, the patch table consulted on dispatch, the
//! generation sequencer, and the [`module::Module`] coordinator that ties the
//! pipeline together.

/// The delta image: parsed representation of one update, plus its reader and writer
pub mod delta;
/// Generations and the per-module update sequencer
pub mod generation;
/// Append-only metadata heaps with stable offsets
pub mod heaps;
/// The merge engine turning a delta into the next generation's state
pub mod merge;
/// Loaded modules, the update coordinator and the embedder-facing registry
pub mod module;
/// The method body patch table consulted on dispatch
pub mod patch;
/// Metadata tables and the copy-on-write table set
pub mod tables;
/// Commonly used metadata token type
pub mod token;
