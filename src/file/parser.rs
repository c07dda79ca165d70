//! Cursor-based parser over a delta blob.
//!
//! [`Parser`] wraps a byte slice with a position cursor and bounds-checked
//! read methods. It is the only way the delta reader touches input bytes;
//! every access goes through [`crate::file::io`] so malformed input surfaces
//! as [`ParseError::Truncated`] rather than a panic or an out-of-bounds read.
//!
//! The parser never holds onto the data it returns: `bytes` hands out slices
//! borrowed from the input, and callers that need to keep them copy them into
//! owned storage before the input buffer goes away.

use crate::{error::ParseError, file::io::read_le_at};

/// A bounds-checked cursor over binary delta data.
///
/// # Examples
///
/// ```
/// use dotpatch::Parser;
///
/// let data = [0x44, 0x4D, 0x45, 0x54, 0x01, 0x00, 0x00, 0x00];
/// let mut parser = Parser::new(&data);
///
/// let magic = parser.read_le::<u32>()?;
/// let version = parser.read_le::<u32>()?;
/// assert_eq!(version, 1);
/// assert!(!parser.has_more());
/// # Ok::<(), dotpatch::ParseError>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser over `data` with the cursor at the start.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Number of bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// `true` while the cursor has not reached the end of the buffer.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// [`ParseError::Truncated`] if `position` lies past the end of the buffer.
    pub fn seek(&mut self, position: usize) -> Result<(), ParseError> {
        if position > self.data.len() {
            return Err(ParseError::Truncated {
                needed: position,
                available: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Read a little-endian value and advance the cursor.
    ///
    /// # Errors
    /// [`ParseError::Truncated`] if fewer than `size_of::<T>()` bytes remain.
    pub fn read_le<T: crate::file::io::LittleEndian>(&mut self) -> Result<T, ParseError> {
        read_le_at(self.data, &mut self.position)
    }

    /// Borrow the next `count` bytes and advance the cursor past them.
    ///
    /// # Errors
    /// [`ParseError::Truncated`] if fewer than `count` bytes remain.
    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .position
            .checked_add(count)
            .ok_or(ParseError::Truncated {
                needed: count,
                available: self.remaining(),
            })?;
        if end > self.data.len() {
            return Err(ParseError::Truncated {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }
}
