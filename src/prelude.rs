//! Convenient re-exports of the most commonly used types.
//!
//! # Example
//!
//! ```
//! use dotpatch::prelude::*;
//!
//! let module = Module::builder()
//!     .name("App.dll")
//!     .table_rows(TableId::MethodDef, vec![vec![0u8; 8]])
//!     .method_body(Token::from_parts(TableId::MethodDef, 1), vec![0x2A])
//!     .build()?;
//! assert_eq!(module.generation(), 0);
//! # Ok::<(), dotpatch::Error>(())
//! ```

pub use crate::{
    error::{Error, MergeError, ParseError, Stage},
    metadata::{
        delta::{DeltaFlags, DeltaImage, DeltaWriter},
        generation::Generation,
        heaps::{HeapId, HeapSet},
        module::{Module, ModuleBuilder, ModuleId, ModuleRegistry},
        patch::{CodeBody, PatchTable},
        tables::{TableData, TableId, TableSet},
        token::Token,
    },
    Result,
};
