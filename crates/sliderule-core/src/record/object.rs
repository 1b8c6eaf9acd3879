//! `RecordObject` / `RecordInterface`: construction, (de)serialization, and
//! typed field access over a record's raw bytes (spec §3.2, §4.2.2–§4.2.6).

use std::sync::Arc;

use sliderule_membrane::endian::maybe_swap;
use sliderule_membrane::{RecordMemory, pack_bit_field, pointer, unpack_bit_field};

use super::definition::{RecordDefinition, RecordRegistry};
use super::error::RecordError;
use super::field::{FieldDef, FieldFlags, FieldType};

/// The v2 wire header: `{u16 version, u16 type_size, u32 data_size}`, all
/// big-endian (spec §6.1).
const WIRE_VERSION: u16 = 2;
const HEADER_LEN: usize = 8;

fn write_header(buf: &mut [u8], type_name: &str, data_size: u32) {
    buf[0..2].copy_from_slice(&WIRE_VERSION.to_be_bytes());
    let type_size = type_name.len() as u16 + 1;
    buf[2..4].copy_from_slice(&type_size.to_be_bytes());
    buf[4..8].copy_from_slice(&data_size.to_be_bytes());
    let name_start = HEADER_LEN;
    buf[name_start..name_start + type_name.len()].copy_from_slice(type_name.as_bytes());
    buf[name_start + type_name.len()] = 0;
}

struct ParsedHeader {
    type_name: String,
    type_size: u32,
    data_size: u32,
}

fn parse_header(buf: &[u8]) -> Result<ParsedHeader, RecordError> {
    if buf.len() < HEADER_LEN {
        return Err(RecordError::MalformedHeader("buffer shorter than header".into()));
    }
    let version = u16::from_be_bytes(buf[0..2].try_into().unwrap());
    if version != WIRE_VERSION {
        return Err(RecordError::MalformedHeader(format!(
            "unsupported wire version {version}"
        )));
    }
    let type_size = u32::from(u16::from_be_bytes(buf[2..4].try_into().unwrap()));
    let data_size = u32::from_be_bytes(buf[4..8].try_into().unwrap());

    let name_start = HEADER_LEN;
    let name_end = name_start + type_size as usize;
    if name_end > buf.len() || type_size == 0 {
        return Err(RecordError::MalformedHeader("type name runs past buffer".into()));
    }
    if buf[name_end - 1] != 0 {
        return Err(RecordError::MalformedHeader("type name is not NUL-terminated".into()));
    }
    let type_name = String::from_utf8_lossy(&buf[name_start..name_end - 1]).into_owned();

    Ok(ParsedHeader {
        type_name,
        type_size,
        data_size,
    })
}

/// A record instance: a definition reference plus a buffer that is either
/// owned by this object or aliases memory owned elsewhere (spec §3.2).
///
/// `RecordInterface` in the spec's vocabulary is just `RecordObject<'a>`
/// with a borrowed `Aliased` buffer — there is no separate Rust type for it.
pub struct RecordObject<'a> {
    definition: Arc<RecordDefinition>,
    registry: Arc<RecordRegistry>,
    memory: RecordMemory<'a>,
    used: usize,
}

impl<'a> RecordObject<'a> {
    /// Allocates a fresh record for `type_name`, zeroing the payload.
    /// `extra` reserves additional trailing bytes beyond the definition's
    /// fixed `data_size`, for records with a variable trailing array.
    pub fn new(
        registry: &Arc<RecordRegistry>,
        type_name: &str,
        extra: usize,
    ) -> Result<RecordObject<'static>, RecordError> {
        let definition = registry.get(type_name)?;
        let total = definition.record_size as usize + extra;
        let mut memory = RecordMemory::owned(total);
        write_header(memory.as_mut_slice(), type_name, definition.data_size + extra as u32);
        Ok(RecordObject {
            definition,
            registry: registry.clone(),
            memory,
            used: total,
        })
    }

    /// Parses `buf`'s header, looks up its type in `registry`, and aliases
    /// `buf` rather than copying it. The returned record's lifetime is
    /// bounded by `buf`.
    pub fn from_buffer(
        registry: &Arc<RecordRegistry>,
        buf: &'a mut [u8],
    ) -> Result<Self, RecordError> {
        let parsed = parse_header(buf)?;
        let definition = registry.get(&parsed.type_name)?;
        let used = HEADER_LEN + parsed.type_size as usize + parsed.data_size as usize;
        if used > buf.len() {
            return Err(RecordError::MalformedHeader(
                "declared data_size runs past buffer".into(),
            ));
        }
        Ok(RecordObject {
            definition,
            registry: registry.clone(),
            memory: RecordMemory::aliased(buf),
            used,
        })
    }

    /// Like [`RecordObject::from_buffer`] but copies `buf` into an owned
    /// buffer, yielding a record with no borrowed lifetime.
    pub fn from_buffer_owned(
        registry: &Arc<RecordRegistry>,
        buf: Vec<u8>,
    ) -> Result<RecordObject<'static>, RecordError> {
        let parsed = parse_header(&buf)?;
        let definition = registry.get(&parsed.type_name)?;
        let used = HEADER_LEN + parsed.type_size as usize + parsed.data_size as usize;
        if used > buf.len() {
            return Err(RecordError::MalformedHeader(
                "declared data_size runs past buffer".into(),
            ));
        }
        Ok(RecordObject {
            definition,
            registry: registry.clone(),
            memory: RecordMemory::Owned(buf),
            used,
        })
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<RecordDefinition> {
        &self.definition
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.definition.type_name
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn allocated(&self) -> usize {
        self.memory.len()
    }

    fn payload_start(&self) -> usize {
        HEADER_LEN + self.definition.type_size as usize
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.memory.as_slice()[self.payload_start()..self.used]
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.payload_start();
        let used = self.used;
        &mut self.memory.as_mut_slice()[start..used]
    }

    /// Rewrites the header's `data_size` (the wire DLEN) to `new_data_size`
    /// bytes, growing or shrinking `used` accordingly. This is how a
    /// producer emits a variable-length trailing array (spec §4.2.3).
    pub fn set_data_size(&mut self, new_data_size: u32) -> Result<(), RecordError> {
        let new_used = self.payload_start() + new_data_size as usize;
        if new_used > self.memory.len() {
            return Err(RecordError::BufferTooSmall {
                needed: new_used,
                have: self.memory.len(),
            });
        }
        self.memory.as_mut_slice()[4..8].copy_from_slice(&new_data_size.to_be_bytes());
        self.used = new_used;
        Ok(())
    }

    /// Copies the record's used bytes into a freshly allocated buffer
    /// (spec's `ALLOCATE` serialize mode).
    #[must_use]
    pub fn serialize_allocate(&self) -> Vec<u8> {
        self.memory.as_slice()[..self.used].to_vec()
    }

    /// Borrows the record's used bytes without copying (`REFERENCE` mode) —
    /// the caller must not attempt to free this memory.
    #[must_use]
    pub fn serialize_reference(&self) -> &[u8] {
        &self.memory.as_slice()[..self.used]
    }

    /// Copies the record's used bytes into `dst` (`COPY` mode).
    pub fn serialize_copy(&self, dst: &mut [u8]) -> Result<(), RecordError> {
        if dst.len() < self.used {
            return Err(RecordError::BufferTooSmall {
                needed: self.used,
                have: dst.len(),
            });
        }
        dst[..self.used].copy_from_slice(&self.memory.as_slice()[..self.used]);
        Ok(())
    }

    /// Consumes the record and hands back its owned buffer, truncated to
    /// `used` bytes (`TAKE_OWNERSHIP` mode) — lets a producer post a record
    /// to a queue with a single allocation and no further copies. Only
    /// valid when this record owns its memory.
    pub fn serialize_take_ownership(self) -> Result<Vec<u8>, RecordError> {
        match self.memory {
            RecordMemory::Owned(mut v) => {
                v.truncate(self.used);
                Ok(v)
            }
            RecordMemory::Aliased(_) => Err(RecordError::CannotTakeOwnership),
        }
    }

    /// Overwrites this record's memory with `buf`, which must declare the
    /// same type and fit within the allocated buffer.
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<(), RecordError> {
        let parsed = parse_header(buf)?;
        if parsed.type_name != self.definition.type_name {
            return Err(RecordError::DefinitionMismatch {
                expected: self.definition.type_name.clone(),
                found: parsed.type_name,
            });
        }
        if buf.len() > self.memory.len() {
            return Err(RecordError::BufferTooSmall {
                needed: buf.len(),
                have: self.memory.len(),
            });
        }
        self.memory.as_mut_slice()[..buf.len()].copy_from_slice(buf);
        self.used = buf.len();
        Ok(())
    }

    /// Resolves a field path: a plain name, dotted `outer.inner` descending
    /// through `User` fields, bracket `arr[i]` indexing, or an unregistered
    /// `#TYPE(offset,size)` immediate field (spec §4.2.4).
    pub fn resolve_field(&self, path: &str) -> Result<FieldDef, RecordError> {
        if let Some(imm) = parse_immediate_field(path) {
            return Ok(imm);
        }

        let mut current_def = self.definition.clone();
        let mut bias_bits = 0u32;
        let segments: Vec<&str> = path.split('.').collect();

        for (i, raw_segment) in segments.iter().enumerate() {
            let (name, index) = parse_bracket(raw_segment)?;
            let mut field = current_def
                .field(name)
                .cloned()
                .ok_or_else(|| RecordError::InvalidField(path.to_string()))?;
            field.offset_bits += bias_bits;

            if let Some(idx) = index {
                if field.flags.contains(FieldFlags::POINTER) {
                    return Err(RecordError::InvalidField(format!(
                        "bracket indexing is not supported on pointer field '{raw_segment}'"
                    )));
                }
                if idx as u32 >= field.elements {
                    return Err(RecordError::OutOfRange {
                        index: idx,
                        elements: field.elements,
                    });
                }
                let width = field.field_type.fixed_width().unwrap_or(1);
                field.offset_bits += to_bytes_to_bits(idx as u32 * width);
                field.elements = 1;
            }

            let is_last = i == segments.len() - 1;
            if is_last {
                return Ok(field);
            }

            if field.field_type != FieldType::User {
                return Err(RecordError::InvalidField(format!(
                    "'{raw_segment}' is not a nested record field"
                )));
            }
            let exttype = field
                .exttype
                .clone()
                .ok_or_else(|| RecordError::InvalidField(raw_segment.to_string()))?;
            bias_bits = field.offset_bits;
            // The nested definition must already be registered: the
            // scan-time cycle guard (spec §9) only follows `User` fields
            // whose `exttype` is registered, and the same rule holds here.
            current_def = self.registry.get(&exttype)?;
        }

        Err(RecordError::InvalidField("empty field path".to_string()))
    }

    /// Reads a pointer field's stored offset and returns a synthesized
    /// [`FieldDef`] describing the field it points to — a view, not an
    /// owned sub-object (spec §4.2.6, §9).
    pub fn deref_pointer(&self, field: &FieldDef, allow_null: bool) -> Result<FieldDef, RecordError> {
        if !field.flags.contains(FieldFlags::POINTER) {
            return Err(RecordError::InvalidField("field is not a POINTER field".into()));
        }
        let byte_offset = field.offset_bytes() as usize;
        let payload = self.payload();
        let stored = pointer::read_pointer(payload, byte_offset, field.is_big_endian());
        let target_width = field.field_type.fixed_width().unwrap_or(1) as usize;
        let resolved_offset =
            pointer::pointer_view(payload.len(), stored, target_width, allow_null)?;
        Ok(FieldDef {
            field_type: field.field_type,
            offset_bits: resolved_offset * 8,
            elements: field.elements,
            exttype: field.exttype.clone(),
            flags: field.flags - FieldFlags::POINTER,
        })
    }

    /// Reads `field` as a signed integer, promoting through `i64`
    /// (`getValueInteger`).
    pub fn get_value_integer(&self, field: &FieldDef, element: usize) -> Result<i64, RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        let payload = self.payload();
        read_integer(payload, &field, element)
    }

    pub fn set_value_integer(
        &mut self,
        field: &FieldDef,
        value: i64,
        element: usize,
    ) -> Result<(), RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        let payload = self.payload_mut();
        write_integer(payload, &field, element, value)
    }

    /// Reads `field` as a real number, promoting/demoting through `f64`
    /// (`getValueReal`).
    pub fn get_value_real(&self, field: &FieldDef, element: usize) -> Result<f64, RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        let payload = self.payload();
        read_real(payload, &field, element)
    }

    pub fn set_value_real(
        &mut self,
        field: &FieldDef,
        value: f64,
        element: usize,
    ) -> Result<(), RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        let payload = self.payload_mut();
        write_real(payload, &field, element, value)
    }

    /// Coerces `field` to its default text representation (`getValueText`).
    pub fn get_value_text(&self, field: &FieldDef, element: usize) -> Result<String, RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        if field.field_type == FieldType::String {
            let offset = field.offset_bytes() as usize;
            let payload = self.payload();
            let max_len = if field.elements == 0 {
                payload.len() - offset
            } else {
                field.elements as usize
            };
            let end = (offset + max_len).min(payload.len());
            let slice = &payload[offset..end];
            let nul_at = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
            return Ok(String::from_utf8_lossy(&slice[..nul_at]).into_owned());
        }
        if is_integer_field(field.field_type) {
            return Ok(self.get_value_integer(&field, element)?.to_string());
        }
        Ok(format!("{}", self.get_value_real(&field, element)?))
    }

    /// Parses `text` into `field`'s type (`setValueText`). `String` fields
    /// are bounded by their declared length, or by the record's remaining
    /// allocated memory when variable (`elements == 0`).
    pub fn set_value_text(
        &mut self,
        field: &FieldDef,
        text: &str,
        element: usize,
    ) -> Result<(), RecordError> {
        let field = self.deref_if_pointer(field, false)?;
        if field.field_type == FieldType::String {
            let offset = field.offset_bytes() as usize;
            let allocated = self.memory.len() - self.payload_start();
            let max_len = if field.elements == 0 {
                allocated - offset
            } else {
                field.elements as usize
            };
            let bytes = text.as_bytes();
            let copy_len = bytes.len().min(max_len.saturating_sub(1));
            let payload = self.payload_mut();
            payload[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            if offset + copy_len < payload.len() {
                payload[offset + copy_len] = 0;
            }
            return Ok(());
        }
        if is_integer_field(field.field_type) {
            let value: i64 = text
                .trim()
                .parse()
                .map_err(|_| RecordError::InvalidField(format!("cannot parse '{text}' as integer")))?;
            return self.set_value_integer(&field, value, element);
        }
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| RecordError::InvalidField(format!("cannot parse '{text}' as real")))?;
        self.set_value_real(&field, value, element)
    }

    fn deref_if_pointer(&self, field: &FieldDef, allow_null: bool) -> Result<FieldDef, RecordError> {
        if field.flags.contains(FieldFlags::POINTER) {
            self.deref_pointer(field, allow_null)
        } else {
            Ok(field.clone())
        }
    }
}

fn to_bytes_to_bits(bytes: u32) -> u32 {
    bytes * 8
}

fn is_integer_field(t: FieldType) -> bool {
    matches!(
        t,
        FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::Uint8
            | FieldType::Uint16
            | FieldType::Uint32
            | FieldType::Uint64
            | FieldType::BitField
            | FieldType::Bool
    )
}

fn elem_offset(field: &FieldDef, element: usize) -> Result<usize, RecordError> {
    if element > 0 && element as u32 >= field.elements.max(1) {
        return Err(RecordError::OutOfRange {
            index: element,
            elements: field.elements,
        });
    }
    let width = field.field_type.fixed_width().unwrap_or(1);
    Ok(field.offset_bytes() as usize + element * width as usize)
}

fn read_integer(payload: &[u8], field: &FieldDef, element: usize) -> Result<i64, RecordError> {
    let big = field.is_big_endian();
    if field.field_type == FieldType::BitField {
        return Ok(unpack_bit_field(payload, field.offset_bits, field.elements)? as i64);
    }
    let offset = elem_offset(field, element)?;
    check_len(payload, offset, field.field_type)?;
    Ok(match field.field_type {
        FieldType::Int8 => payload[offset] as i8 as i64,
        FieldType::Uint8 | FieldType::Bool => payload[offset] as i64,
        FieldType::Int16 => maybe_swap(i16::from_ne_bytes(payload[offset..offset + 2].try_into().unwrap()), big) as i64,
        FieldType::Uint16 => maybe_swap(u16::from_ne_bytes(payload[offset..offset + 2].try_into().unwrap()), big) as i64,
        FieldType::Int32 => maybe_swap(i32::from_ne_bytes(payload[offset..offset + 4].try_into().unwrap()), big) as i64,
        FieldType::Uint32 => maybe_swap(u32::from_ne_bytes(payload[offset..offset + 4].try_into().unwrap()), big) as i64,
        FieldType::Int64 => maybe_swap(i64::from_ne_bytes(payload[offset..offset + 8].try_into().unwrap()), big),
        FieldType::Uint64 => maybe_swap(u64::from_ne_bytes(payload[offset..offset + 8].try_into().unwrap()), big) as i64,
        FieldType::Float => maybe_swap(f32::from_ne_bytes(payload[offset..offset + 4].try_into().unwrap()), big) as i64,
        FieldType::Double => maybe_swap(f64::from_ne_bytes(payload[offset..offset + 8].try_into().unwrap()), big) as i64,
        FieldType::Time8 => read_time8(payload, offset, big)? as i64,
        _ => return Err(RecordError::InvalidField("field type has no integer representation".into())),
    })
}

fn write_integer(payload: &mut [u8], field: &FieldDef, element: usize, value: i64) -> Result<(), RecordError> {
    let big = field.is_big_endian();
    if field.field_type == FieldType::BitField {
        pack_bit_field(payload, field.offset_bits, field.elements, value as u64)?;
        return Ok(());
    }
    let offset = elem_offset(field, element)?;
    check_len(payload, offset, field.field_type)?;
    match field.field_type {
        FieldType::Int8 => payload[offset] = value as i8 as u8,
        FieldType::Uint8 | FieldType::Bool => payload[offset] = value as u8,
        FieldType::Int16 => payload[offset..offset + 2].copy_from_slice(&maybe_swap(value as i16, big).to_ne_bytes()),
        FieldType::Uint16 => payload[offset..offset + 2].copy_from_slice(&maybe_swap(value as u16, big).to_ne_bytes()),
        FieldType::Int32 => payload[offset..offset + 4].copy_from_slice(&maybe_swap(value as i32, big).to_ne_bytes()),
        FieldType::Uint32 => payload[offset..offset + 4].copy_from_slice(&maybe_swap(value as u32, big).to_ne_bytes()),
        FieldType::Int64 => payload[offset..offset + 8].copy_from_slice(&maybe_swap(value, big).to_ne_bytes()),
        FieldType::Uint64 => payload[offset..offset + 8].copy_from_slice(&maybe_swap(value as u64, big).to_ne_bytes()),
        FieldType::Float => payload[offset..offset + 4].copy_from_slice(&maybe_swap(value as f32, big).to_ne_bytes()),
        FieldType::Double => payload[offset..offset + 8].copy_from_slice(&maybe_swap(value as f64, big).to_ne_bytes()),
        FieldType::Time8 => write_time8(payload, offset, value as f64, big)?,
        _ => return Err(RecordError::InvalidField("field type has no integer representation".into())),
    }
    Ok(())
}

fn read_real(payload: &[u8], field: &FieldDef, element: usize) -> Result<f64, RecordError> {
    if matches!(field.field_type, FieldType::Float | FieldType::Double | FieldType::Time8) {
        let big = field.is_big_endian();
        let offset = elem_offset(field, element)?;
        check_len(payload, offset, field.field_type)?;
        return Ok(match field.field_type {
            FieldType::Float => f64::from(maybe_swap(f32::from_ne_bytes(payload[offset..offset + 4].try_into().unwrap()), big)),
            FieldType::Double => maybe_swap(f64::from_ne_bytes(payload[offset..offset + 8].try_into().unwrap()), big),
            FieldType::Time8 => read_time8(payload, offset, big)?,
            _ => unreachable!(),
        });
    }
    Ok(read_integer(payload, field, element)? as f64)
}

fn write_real(payload: &mut [u8], field: &FieldDef, element: usize, value: f64) -> Result<(), RecordError> {
    if matches!(field.field_type, FieldType::Float | FieldType::Double | FieldType::Time8) {
        let big = field.is_big_endian();
        let offset = elem_offset(field, element)?;
        check_len(payload, offset, field.field_type)?;
        match field.field_type {
            FieldType::Float => payload[offset..offset + 4].copy_from_slice(&maybe_swap(value as f32, big).to_ne_bytes()),
            FieldType::Double => payload[offset..offset + 8].copy_from_slice(&maybe_swap(value, big).to_ne_bytes()),
            FieldType::Time8 => write_time8(payload, offset, value, big)?,
            _ => unreachable!(),
        }
        return Ok(());
    }
    write_integer(payload, field, element, value as i64)
}

fn read_time8(payload: &[u8], offset: usize, big: bool) -> Result<f64, RecordError> {
    if offset + 8 > payload.len() {
        return Err(RecordError::BufferTooSmall {
            needed: offset + 8,
            have: payload.len(),
        });
    }
    let secs = maybe_swap(u32::from_ne_bytes(payload[offset..offset + 4].try_into().unwrap()), big);
    let sub = maybe_swap(u32::from_ne_bytes(payload[offset + 4..offset + 8].try_into().unwrap()), big);
    Ok(f64::from(secs) + f64::from(sub) / 1e9)
}

fn write_time8(payload: &mut [u8], offset: usize, value: f64, big: bool) -> Result<(), RecordError> {
    if offset + 8 > payload.len() {
        return Err(RecordError::BufferTooSmall {
            needed: offset + 8,
            have: payload.len(),
        });
    }
    let secs = value.trunc().max(0.0) as u32;
    let sub = (value.fract() * 1e9).round().max(0.0) as u32;
    payload[offset..offset + 4].copy_from_slice(&maybe_swap(secs, big).to_ne_bytes());
    payload[offset + 4..offset + 8].copy_from_slice(&maybe_swap(sub, big).to_ne_bytes());
    Ok(())
}

fn check_len(payload: &[u8], offset: usize, field_type: FieldType) -> Result<(), RecordError> {
    let width = field_type.fixed_width().unwrap_or(1) as usize;
    if offset + width > payload.len() {
        return Err(RecordError::BufferTooSmall {
            needed: offset + width,
            have: payload.len(),
        });
    }
    Ok(())
}

/// Splits `name[index]` into `(name, Some(index))`, or `(name, None)` if
/// there's no bracket.
fn parse_bracket(segment: &str) -> Result<(&str, Option<usize>), RecordError> {
    let Some(open) = segment.find('[') else {
        return Ok((segment, None));
    };
    let close = segment
        .find(']')
        .filter(|&c| c > open)
        .ok_or_else(|| RecordError::InvalidField(segment.to_string()))?;
    let name = &segment[..open];
    let index: usize = segment[open + 1..close]
        .parse()
        .map_err(|_| RecordError::InvalidField(segment.to_string()))?;
    Ok((name, Some(index)))
}

/// Parses `#TYPE(offset,size)`, where offset and size are given in bits
/// (spec §4.2.4).
fn parse_immediate_field(segment: &str) -> Option<FieldDef> {
    let rest = segment.strip_prefix('#')?;
    let open = rest.find('(')?;
    let close = rest.find(')').filter(|&c| c > open)?;
    let type_name = &rest[..open];
    let mut parts = rest[open + 1..close].split(',');
    let offset: u32 = parts.next()?.trim().parse().ok()?;
    let size: u32 = parts.next()?.trim().parse().ok()?;

    let field_type = str_to_field_type(type_name)?;
    let elements = match field_type {
        FieldType::BitField => size,
        FieldType::String => size / 8,
        _ => 1,
    };
    Some(FieldDef::new(field_type, offset, elements, FieldFlags::native_default()))
}

fn str_to_field_type(s: &str) -> Option<FieldType> {
    Some(match s {
        "INT8" => FieldType::Int8,
        "INT16" => FieldType::Int16,
        "INT32" => FieldType::Int32,
        "INT64" => FieldType::Int64,
        "UINT8" => FieldType::Uint8,
        "UINT16" => FieldType::Uint16,
        "UINT32" => FieldType::Uint32,
        "UINT64" => FieldType::Uint64,
        "BITFIELD" => FieldType::BitField,
        "FLOAT" => FieldType::Float,
        "DOUBLE" => FieldType::Double,
        "TIME8" => FieldType::Time8,
        "STRING" => FieldType::String,
        "BOOL" => FieldType::Bool,
        _ => return None,
    })
}
