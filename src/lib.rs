// Copyright 2026 The dotpatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'file/mod.rs' uses mmap to map delta files into memory

//! # dotpatch
//!
//! An in-process metadata/IL delta application engine: the runtime component
//! behind "Edit-and-Continue" style hot reload. A running embedder hands the
//! engine a metadata delta blob (`.dmeta`) and an IL delta blob (`.dil`), and
//! the engine applies them to an already-loaded module so that subsequently
//! invoked methods run new code — while other threads keep executing code
//! from the same module, unpaused.
//!
//! ## Model
//!
//! - A [`Module`](metadata::module::Module) is a loaded unit of code with a
//!   stable identity and a forward-only history of
//!   [`Generation`](metadata::generation::Generation)s: generation 0 is the
//!   original load, each applied delta produces generation N+1, and committed
//!   generations are never rolled back.
//! - Metadata entities are addressed by [`Token`](metadata::token::Token)s
//!   whose validity never changes across generations: a token always
//!   resolves, either to original or to updated content.
//! - Method dispatch consults a per-generation patch table
//!   ([`metadata::patch::PatchTable`]); absent entries mean "use the original
//!   body".
//!
//! ## Quick Start
//!
//! ```rust
//! use dotpatch::prelude::*;
//!
//! // Baseline: one method with body A.
//! let module = Module::builder()
//!     .name("App.dll")
//!     .table_rows(TableId::MethodDef, vec![vec![0u8; 8]])
//!     .method_body(Token::from_parts(TableId::MethodDef, 1), b"bodyA".to_vec())
//!     .build()?;
//!
//! // Generation 1: replace the body.
//! let (dmeta, dil) = DeltaWriter::new()
//!     .il_body(Token::from_parts(TableId::MethodDef, 1), b"bodyB".to_vec())
//!     .finish();
//! let generation = module.apply_update(&dmeta, &dil)?;
//! assert_eq!(generation, 1);
//!
//! let body = module.resolve(Token::from_parts(TableId::MethodDef, 1))?;
//! assert_eq!(body.il.as_ref(), b"bodyB");
//! # Ok::<(), dotpatch::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! Updates on one module are strictly serialized (a concurrent attempt gets
//! [`Error::Busy`] and retries); readers never take a lock. Each update is
//! built on shadow state and published with a single release-ordered store, so
//! every thread observes either generation N-1 or generation N in full, never
//! a mixture. A thread that fetched a
//! [`CodeBody`](metadata::patch::CodeBody) before the publish keeps running
//! the old body to completion.
//!
//! ## Errors
//!
//! All operations return [`Result<T, Error>`](Result). Failures are tagged
//! with the pipeline stage that produced them ([`Error::stage`]), and no
//! failure can corrupt a previously published generation:
//!
//! ```rust
//! use dotpatch::prelude::*;
//!
//! let module = Module::builder().name("App.dll").build()?;
//! let err = module.apply_update(b"garbage", &[]).unwrap_err();
//! assert_eq!(err.stage(), Stage::Parse);
//! assert_eq!(module.generation(), 0);
//! # Ok::<(), dotpatch::Error>(())
//! ```

pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types and traits.
pub mod prelude;

/// Metadata model: tokens, tables, heaps, deltas, generations and modules.
pub mod metadata;

/// `dotpatch` Result type.
///
/// A type alias for [`std::result::Result<T, Error>`] used consistently for
/// all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotpatch` Error type: the full error taxonomy with stage tagging.
pub use error::{Error, MergeError, ParseError, Stage};

/// Main entry point: a loaded module and its update coordinator.
pub use metadata::module::{Module, ModuleBuilder, ModuleId, ModuleRegistry};

/// The decoded representation of one update and its producer-side writer.
pub use metadata::delta::{DeltaFlags, DeltaImage, DeltaWriter};

/// Core metadata addressing and dispatch types.
pub use metadata::{
    heaps::HeapId,
    patch::CodeBody,
    tables::TableId,
    token::Token,
};

/// Low-level bounds-checked binary parsing over delta blobs.
pub use file::parser::Parser;

/// Memory-mapped access to an on-disk `.dmeta`/`.dil` pair.
pub use file::DeltaPair;
