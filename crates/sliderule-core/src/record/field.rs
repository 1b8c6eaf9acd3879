//! Field types, flags, and the `end_of_field` sizing rule (spec §3.1).

use bitflags::bitflags;
use sliderule_membrane::endian::{host_is_big_endian, to_bytes};

/// The type a field's bytes are interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// Size in bits, not bytes — carried in `FieldDef::elements`.
    BitField,
    Float,
    Double,
    /// 64-bit GPS time: a big-endian `{u32 seconds, u32 subseconds}` pair.
    Time8,
    /// Fixed length (`elements` bytes) or variable when `elements == 0`.
    String,
    /// A nested record; `FieldDef::exttype` names the sub-definition.
    User,
    Bool,
    Invalid,
}

impl FieldType {
    /// Byte width of one element of this type, for non-bitfield,
    /// non-string, non-user types. Bit-fields and strings have no fixed
    /// per-element width; callers must special-case them.
    #[must_use]
    pub const fn fixed_width(self) -> Option<u32> {
        match self {
            Self::Int8 | Self::Uint8 | Self::Bool => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Float => Some(4),
            Self::Int64 | Self::Uint64 | Self::Double | Self::Time8 => Some(8),
            Self::BitField | Self::String | Self::User | Self::Invalid => None,
        }
    }
}

bitflags! {
    /// Per-field semantic and encoding flags (spec §3.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u16 {
        /// The field's bytes are big-endian on the wire. Defaults to the
        /// host's native endianness when a definition doesn't say otherwise.
        const BIGENDIAN = 1 << 0;
        /// A 32-bit byte offset into this record's own payload.
        const POINTER   = 1 << 1;
        const AUX       = 1 << 2;
        const BATCH     = 1 << 3;
        const X_COORD   = 1 << 4;
        const Y_COORD   = 1 << 5;
        const Z_COORD   = 1 << 6;
        const TIME      = 1 << 7;
        const INDEX     = 1 << 8;
    }
}

impl FieldFlags {
    /// The flag value matching the host's native endianness — fields left
    /// at their default carry this, so a definition written on a
    /// little-endian host degrades gracefully on a big-endian reader.
    #[must_use]
    pub fn native_default() -> Self {
        if host_is_big_endian() {
            Self::BIGENDIAN
        } else {
            Self::empty()
        }
    }
}

/// One field in a record definition: `(offset_bits, elements, type, flags)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub field_type: FieldType,
    /// Always stored in bits, including for non-bitfield fields.
    pub offset_bits: u32,
    /// Element count for arrays/strings; bit-count for `BitField`.
    pub elements: u32,
    /// Sub-definition name for `User` fields.
    pub exttype: Option<String>,
    pub flags: FieldFlags,
}

impl FieldDef {
    #[must_use]
    pub fn new(field_type: FieldType, offset_bits: u32, elements: u32, flags: FieldFlags) -> Self {
        Self {
            field_type,
            offset_bits,
            elements,
            exttype: None,
            flags,
        }
    }

    #[must_use]
    pub fn with_exttype(mut self, exttype: impl Into<String>) -> Self {
        self.exttype = Some(exttype.into());
        self
    }

    #[must_use]
    pub fn is_big_endian(&self) -> bool {
        self.flags.contains(FieldFlags::BIGENDIAN)
    }

    #[must_use]
    pub fn offset_bytes(&self) -> u32 {
        to_bytes(self.offset_bits)
    }
}

/// Bytes needed to hold this field, measured from the record's payload
/// start (spec §4.2.1):
/// - `POINTER` fields always occupy 4 bytes (the offset itself).
/// - `BITFIELD` rounds `offset + length` up to the nearest byte.
/// - Everything else is `offset + elements * type_width`.
#[must_use]
pub fn end_of_field(field: &FieldDef) -> u32 {
    if field.flags.contains(FieldFlags::POINTER) {
        return to_bytes(field.offset_bits) + 4;
    }
    match field.field_type {
        FieldType::BitField => to_bytes(field.offset_bits + field.elements),
        // A variable-length trailing field (elements == 0) marks only its
        // start; its true extent is the record's `used` length at runtime,
        // not something the registry can bound ahead of time.
        FieldType::String | FieldType::User if field.elements == 0 => {
            to_bytes(field.offset_bits)
        }
        _ => {
            let width = field.field_type.fixed_width().unwrap_or(1);
            to_bytes(field.offset_bits) + field.elements.max(1) * width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_field_is_always_four_bytes() {
        let f = FieldDef::new(FieldType::Uint64, 0, 1, FieldFlags::POINTER);
        assert_eq!(end_of_field(&f), 4);
    }

    #[test]
    fn bitfield_rounds_up_to_byte() {
        let f = FieldDef::new(FieldType::BitField, 4, 5, FieldFlags::empty());
        // bits 4..9 -> byte 1 inclusive -> 2 bytes
        assert_eq!(end_of_field(&f), 2);
    }

    #[test]
    fn array_field_scales_by_width() {
        let f = FieldDef::new(FieldType::Uint32, 0, 3, FieldFlags::empty());
        assert_eq!(end_of_field(&f), 12);
    }
}
