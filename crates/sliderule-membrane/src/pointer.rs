//! Pointer-field mechanics: a `POINTER` field stores a 32-bit byte offset
//! into its own record's payload (spec §4.2.6, §9: "an arena-plus-offset
//! pattern, not shared ownership" — exposed as a view into the owning
//! record's bytes, never a separately owned object).

use thiserror::Error;

use crate::endian::maybe_swap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointerError {
    #[error("pointer field is null")]
    Null,
    #[error("pointer target offset {offset} + width {width} exceeds buffer of {buf_len} bytes")]
    OutOfBounds {
        offset: u32,
        width: usize,
        buf_len: usize,
    },
}

/// Reads the 4-byte pointer value stored at `byte_offset` in `buf`.
pub fn read_pointer(buf: &[u8], byte_offset: usize, big_endian: bool) -> u32 {
    let bytes: [u8; 4] = buf[byte_offset..byte_offset + 4].try_into().unwrap();
    maybe_swap(u32::from_ne_bytes(bytes), big_endian)
}

/// Writes a 4-byte pointer value at `byte_offset` in `buf`.
pub fn write_pointer(buf: &mut [u8], byte_offset: usize, target: u32, big_endian: bool) {
    let value = maybe_swap(target, big_endian);
    buf[byte_offset..byte_offset + 4].copy_from_slice(&value.to_ne_bytes());
}

/// Validates that a pointer's target `offset` plus a field of byte `width`
/// fits within `buf`, returning the offset for the caller to slice with.
///
/// `offset == 0` is the null pointer convention (spec §4.2.6); callers that
/// permit dereferencing null pass `allow_null = true` and get back `Ok(0)`
/// with the understanding that `0` is a sentinel, not a real offset.
pub fn pointer_view(
    buf_len: usize,
    offset: u32,
    width: usize,
    allow_null: bool,
) -> Result<u32, PointerError> {
    if offset == 0 {
        if allow_null {
            return Ok(0);
        }
        return Err(PointerError::Null);
    }
    let end = offset as usize + width;
    if end > buf_len {
        return Err(PointerError::OutOfBounds {
            offset,
            width,
            buf_len,
        });
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_roundtrip() {
        let mut buf = [0u8; 16];
        write_pointer(&mut buf, 0, 12, false);
        assert_eq!(read_pointer(&buf, 0, false), 12);
    }

    #[test]
    fn null_pointer_requires_allow_null() {
        assert_eq!(pointer_view(16, 0, 4, false), Err(PointerError::Null));
        assert_eq!(pointer_view(16, 0, 4, true), Ok(0));
    }

    #[test]
    fn rejects_out_of_bounds_target() {
        assert_eq!(
            pointer_view(16, 14, 4, false),
            Err(PointerError::OutOfBounds {
                offset: 14,
                width: 4,
                buf_len: 16
            })
        );
        assert_eq!(pointer_view(16, 12, 4, false), Ok(12));
    }
}
