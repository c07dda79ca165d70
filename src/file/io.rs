//! Bounds-checked little-endian read and write helpers.
//!
//! Every multi-byte integer in the delta format is little-endian. The
//! functions here are the single place where raw bytes become typed values,
//! so all range checking lives here as well: a read that would run past the
//! end of the buffer reports [`ParseError::Truncated`] instead of panicking.
//!
//! # Key Components
//!
//! - [`LittleEndian`] - Conversion trait implemented for the primitive integers
//!   the delta format uses
//! - [`read_le_at`] - Read a value at an offset and advance the offset
//! - [`put_le`] - Append a value to an output buffer (used by the delta writer)

use crate::error::ParseError;

/// Conversion between primitive integers and their little-endian byte form.
///
/// Implemented for the integer widths that appear in the delta format. The
/// associated `Bytes` array pins the exact on-disk size of each type.
pub trait LittleEndian: Sized {
    /// Fixed-size byte array matching this type's encoded width.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Decode from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Encode to little-endian bytes.
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_little_endian {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl LittleEndian for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_little_endian!(u8 => 1, u16 => 2, u32 => 4, u64 => 8);

/// Read a `T` from `data` at `*offset`, advancing the offset on success.
///
/// # Errors
/// [`ParseError::Truncated`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: LittleEndian>(data: &[u8], offset: &mut usize) -> Result<T, ParseError> {
    let size = std::mem::size_of::<T>();
    let end = offset.checked_add(size).ok_or(ParseError::Truncated {
        needed: size,
        available: 0,
    })?;
    if end > data.len() {
        return Err(ParseError::Truncated {
            needed: size,
            available: data.len().saturating_sub(*offset),
        });
    }

    let Ok(bytes) = T::Bytes::try_from(&data[*offset..end]) else {
        // The slice length equals size_of::<T>() by construction.
        return Err(ParseError::Truncated {
            needed: size,
            available: data.len() - *offset,
        });
    };

    *offset = end;
    Ok(T::from_le_bytes(bytes))
}

/// Append `value` to `buf` in little-endian form.
pub fn put_le<T: LittleEndian>(buf: &mut Vec<u8>, value: T) {
    buf.extend_from_slice(value.to_le_bytes().as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le_at_advances() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut offset = 0;

        let first: u16 = read_le_at(&data, &mut offset).unwrap();
        assert_eq!(first, 1);
        assert_eq!(offset, 2);

        let second: u32 = read_le_at(&data, &mut offset).unwrap();
        assert_eq!(second, 2);
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_read_le_at_truncated() {
        let data = [0xAA, 0xBB];
        let mut offset = 1;

        let err = read_le_at::<u32>(&data, &mut offset).unwrap_err();
        assert_eq!(
            err,
            ParseError::Truncated {
                needed: 4,
                available: 1
            }
        );
        // Offset is untouched on failure.
        assert_eq!(offset, 1);
    }

    #[test]
    fn test_put_le_round_trip() {
        let mut buf = Vec::new();
        put_le::<u32>(&mut buf, 0xDEAD_BEEF);
        put_le::<u8>(&mut buf, 0x7F);

        let mut offset = 0;
        assert_eq!(read_le_at::<u32>(&buf, &mut offset).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_le_at::<u8>(&buf, &mut offset).unwrap(), 0x7F);
        assert_eq!(offset, buf.len());
    }
}
