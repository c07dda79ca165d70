use thiserror::Error;

use crate::metadata::{tables::TableId, token::Token};

/// Errors produced while decoding a delta image pair.
///
/// A parse failure is always recoverable: the update simply does not apply and
/// the target module is left untouched. The input buffers are never trusted;
/// every declared length is checked against the remaining data before it is
/// consumed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The metadata delta does not start with the expected signature.
    #[error("bad delta magic: expected 0x{expected:08x}, found 0x{found:08x}")]
    BadMagic {
        /// The signature the reader expects
        expected: u32,
        /// The signature actually present in the buffer
        found: u32,
    },

    /// The delta was produced by a newer toolchain than this engine understands.
    #[error("unsupported delta format version {0}")]
    UnsupportedVersion(u32),

    /// A declared length exceeds the remaining input.
    ///
    /// Reported whenever a header, record or payload would read past the end of
    /// the provided buffer.
    #[error("truncated delta: needed {needed} bytes, {available} available")]
    Truncated {
        /// Number of bytes the current record requires
        needed: usize,
        /// Number of bytes left in the input
        available: usize,
    },

    /// A table-change record references a table id this engine does not know.
    #[error("unknown metadata table id 0x{0:02x}")]
    UnknownTable(u8),

    /// A heap-addition record references a heap id this engine does not know.
    #[error("unknown metadata heap id 0x{0:02x}")]
    UnknownHeap(u8),

    /// The header flags word contains bits outside the defined set.
    #[error("unknown delta flags 0x{0:08x}")]
    UnknownFlags(u32),
}

/// Errors produced while applying a well-formed delta to live metadata.
///
/// A merge failure means the delta decodes fine but is semantically
/// inapplicable to the module's current generation. Like parse failures these
/// are recoverable; nothing has been published when one is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// A row modification would re-layout the table and break tokens already
    /// captured by running code.
    ///
    /// Rows are fixed-width within a table; replacing a row with a payload of a
    /// different size shifts the decoding of every row behind it.
    #[error("modification of {token} changes row size from {expected} to {actual} bytes")]
    TokenStability {
        /// Token of the row whose identity would be broken
        token: Token,
        /// Current row size in bytes
        expected: usize,
        /// Row size the delta tried to install
        actual: usize,
    },

    /// A row index is neither an existing row nor the next new row.
    #[error("row {row} out of range for {table:?} (next new row is {next_row})")]
    RowOutOfRange {
        /// Table the record targets
        table: TableId,
        /// 1-based row index from the record
        row: u32,
        /// The only index at which an add is accepted
        next_row: u32,
    },

    /// A newly added row does not match the table's established row width.
    #[error("new row for {table:?} is {actual} bytes, table rows are {expected} bytes")]
    RowWidth {
        /// Table the record targets
        table: TableId,
        /// Established row width
        expected: usize,
        /// Payload length of the new row
        actual: usize,
    },

    /// An IL record carries a token that is not a `MethodDef` token.
    #[error("IL body token {0} does not reference the MethodDef table")]
    NotAMethodToken(Token),

    /// An IL record references a method row that does not exist, even after
    /// the delta's own row additions are taken into account.
    #[error("IL body token {0} has no MethodDef row in the merged tables")]
    UnknownMethodToken(Token),

    /// The delta carries no table changes, heap additions or IL bodies.
    ///
    /// Applying it would publish a generation indistinguishable from its
    /// predecessor, so it is rejected instead of consuming a generation number.
    #[error("delta contains no changes")]
    EmptyDelta,
}

/// The pipeline stage at which an update attempt failed.
///
/// Returned by [`Error::stage`] so callers and tests can distinguish parse
/// failures from merge failures from publish contention without matching on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    /// Acquiring the per-module update serialization
    Sequence,
    /// Decoding the dmeta/dil pair
    Parse,
    /// Applying the decoded delta to the current tables
    Merge,
    /// Publishing the new generation
    Publish,
}

/// The generic Error type covering every failure this library can return.
///
/// Each variant is tagged with the pipeline stage it originates from via
/// [`Error::stage`]. None of these errors can corrupt a previously published
/// generation: an update that fails at any stage leaves the module exactly as
/// it was.
#[derive(Error, Debug)]
pub enum Error {
    /// The delta image pair could not be decoded.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The delta decoded fine but cannot be applied to the current metadata.
    #[error("{0}")]
    Merge(#[from] MergeError),

    /// Another update is already in flight for this module.
    ///
    /// Updates are strictly serialized per module. This is not fatal; callers
    /// are expected to retry once the in-flight update settles.
    #[error("another update is in flight for this module")]
    Busy,

    /// The commit-time generation check failed.
    ///
    /// Unreachable under the ticket discipline: a ticket can only publish
    /// generation `current + 1` while holding the update lock. Seeing this
    /// error indicates a coordination bug; the update attempt is abandoned but
    /// published generations remain intact.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A token that is valid in no generation of the module.
    #[error("token {0} is not valid in any generation of this module")]
    UnknownToken(Token),

    /// No module with the requested identity is registered.
    #[error("no module registered as '{0}'")]
    ModuleNotFound(String),

    /// File I/O error while mapping a delta pair from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// The pipeline stage this error is attributed to.
    ///
    /// I/O failures happen while the delta buffers are being mapped, before any
    /// table is touched, so they count as [`Stage::Parse`]. Token and module
    /// lookup failures are attributed to [`Stage::Merge`] since they reflect
    /// metadata state rather than input decoding.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Error::Parse(_) | Error::FileError(_) => Stage::Parse,
            Error::Merge(_) | Error::UnknownToken(_) | Error::ModuleNotFound(_) => Stage::Merge,
            Error::Busy => Stage::Sequence,
            Error::Publish(_) => Stage::Publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tagging() {
        let err = Error::from(ParseError::UnsupportedVersion(9));
        assert_eq!(err.stage(), Stage::Parse);

        let err = Error::from(MergeError::EmptyDelta);
        assert_eq!(err.stage(), Stage::Merge);

        assert_eq!(Error::Busy.stage(), Stage::Sequence);
        assert_eq!(Error::Publish("check failed".into()).stage(), Stage::Publish);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::Truncated {
            needed: 16,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "truncated delta: needed 16 bytes, 4 available"
        );
    }

    #[test]
    fn test_merge_error_display() {
        let err = MergeError::UnknownMethodToken(Token::new(0x0600_0042));
        assert!(err.to_string().contains("0x06000042"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Parse.to_string(), "Parse");
        assert_eq!(Stage::Publish.to_string(), "Publish");
    }
}
