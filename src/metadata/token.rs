use std::fmt;

use crate::metadata::tables::TableId;

/// A metadata token: a stable 32-bit identifier for a metadata entity.
///
/// The high byte selects the metadata table, the low 24 bits the 1-based row
/// index within it. Token validity never changes across generations: a token
/// that resolves in generation 0 resolves in every later generation, either to
/// the original content or to updated content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from a raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for `row` of `table`.
    ///
    /// Only the low 24 bits of `row` participate in the token.
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token((u32::from(table as u8) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table byte (bits 24-31).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The table byte decoded to a [`TableId`], if it names a known table.
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_repr(self.table())
    }

    /// The 1-based row index (bits 0-23).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` for the null token (value 0).
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// `true` if this token references the `MethodDef` table.
    ///
    /// Only `MethodDef` tokens may carry IL bodies in a delta.
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.table() == TableId::MethodDef as u8
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        let token = Token::from_parts(TableId::MethodDef, 1);
        assert_eq!(token.value(), 0x0600_0001);
        assert_eq!(token.table_id(), Some(TableId::MethodDef));
        assert_eq!(token.row(), 1);
        assert!(token.is_method());
    }

    #[test]
    fn test_from_parts_masks_row() {
        let token = Token::from_parts(TableId::TypeDef, 0x0100_0005);
        assert_eq!(token.row(), 5);
        assert_eq!(token.table(), 0x02);
    }

    #[test]
    fn test_table_and_row_split() {
        let token = Token::new(0x0200_0010);
        assert_eq!(token.table(), 0x02);
        assert_eq!(token.row(), 0x10);
        assert!(!token.is_method());
    }

    #[test]
    fn test_unknown_table_byte() {
        let token = Token::new(0xFF00_0001);
        assert_eq!(token.table_id(), None);
    }

    #[test]
    fn test_null_token() {
        assert!(Token::new(0).is_null());
        assert!(!Token::from_parts(TableId::Module, 1).is_null());
    }

    #[test]
    fn test_display_and_debug() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.to_string(), "0x06000001");
        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }
}
