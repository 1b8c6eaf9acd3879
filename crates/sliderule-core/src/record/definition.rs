//! The record-definition registry (spec §3.1, §4.2.1).
//!
//! A definition is immutable once published: `type_name`, field set, and
//! `data_size` never change (Non-goal: "no schema evolution of already-
//! registered record definitions"). Instances hold an `Arc` to their
//! definition rather than a raw pointer, so "registry outlives instances"
//! falls out of ordinary reference counting.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::dictionary::Dictionary;

use super::field::{FieldDef, FieldFlags, FieldType, end_of_field};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordDefError {
    #[error("record type '{0}' is already registered")]
    Duplicate(String),
    #[error("num_fields ({num_fields}) exceeds max_fields ({max_fields})")]
    NumFieldErr { num_fields: usize, max_fields: usize },
    #[error("field '{field}' in '{type_name}': {reason}")]
    FieldErr {
        type_name: String,
        field: String,
        reason: String,
    },
    #[error("record type '{0}' is not registered")]
    NotFound(String),
    #[error("id_field '{0}' does not name an integer-typed field")]
    InvalidIdField(String),
}

/// How many extra field slots to reserve beyond the fields given at
/// registration time (spec §4.2.1: `max_fields = CALC` means `1.5 *
/// num_fields`). Rust's `Dictionary` grows on demand, so this only affects
/// the initial table size hint, not a hard ceiling.
#[derive(Debug, Clone, Copy)]
pub enum MaxFields {
    Exact(usize),
    Calc,
}

impl MaxFields {
    #[must_use]
    pub fn resolve(self, num_fields: usize) -> usize {
        match self {
            Self::Exact(n) => n,
            Self::Calc => (num_fields as f64 * 1.5).ceil() as usize,
        }
    }
}

/// Cached pointers to the first field seen carrying each role flag (spec
/// §4.2.6). Dotted for `User` fields that recurse: e.g. a field found at
/// `photons[0].time` is recorded as `"photons.time"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMeta {
    pub index_field: Option<String>,
    pub time_field: Option<String>,
    pub x_coord_field: Option<String>,
    pub y_coord_field: Option<String>,
    pub z_coord_field: Option<String>,
    pub batch_field: Option<String>,
}

/// An input field to `define_record`, before it's placed in the registry's
/// field dictionary.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub offset_bits: u32,
    pub elements: u32,
    pub exttype: Option<String>,
    pub flags: FieldFlags,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType, offset_bits: u32, elements: u32) -> Self {
        Self {
            name: name.into(),
            field_type,
            offset_bits,
            elements,
            exttype: None,
            flags: FieldFlags::native_default(),
        }
    }

    /// Replaces the field's flags outright. Include
    /// [`FieldFlags::native_default`] explicitly if the field should keep
    /// the host's default endianness alongside other flags.
    #[must_use]
    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_exttype(mut self, exttype: impl Into<String>) -> Self {
        self.exttype = Some(exttype.into());
        self
    }
}

#[derive(Debug)]
pub struct RecordDefinition {
    pub type_name: String,
    pub id_field: Option<String>,
    /// Bytes of the null-terminated type string as stored on the wire.
    pub type_size: u32,
    /// Bytes of the fixed portion of the payload.
    pub data_size: u32,
    pub record_size: u32,
    pub fields: Dictionary<FieldDef>,
    pub meta: RoleMeta,
}

impl RecordDefinition {
    #[must_use]
    pub fn header_len() -> u32 {
        // u16 version + u16 type_size + u32 data_size, all big-endian.
        8
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.find(name)
    }
}

/// Global registry of published record definitions (spec §5: "one mutex,
/// readers hold it only for the duration of a pointer lookup").
pub struct RecordRegistry {
    definitions: Mutex<Dictionary<Arc<RecordDefinition>>>,
}

impl RecordRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: Mutex::new(Dictionary::new()),
        }
    }

    /// Registers a new record type. Duplicate names are reported (the
    /// caller typically logs at `warn` and continues) rather than treated as
    /// a hard error — repeated identical registration on re-init is
    /// idiomatic (spec §4.2.1/§7).
    pub fn define_record(
        &self,
        type_name: impl Into<String>,
        id_field: Option<String>,
        data_size: u32,
        fields: &[FieldSpec],
        max_fields: MaxFields,
    ) -> Result<Arc<RecordDefinition>, RecordDefError> {
        let type_name = type_name.into();
        let num_fields = fields.len();
        let limit = max_fields.resolve(num_fields);
        if num_fields > limit {
            return Err(RecordDefError::NumFieldErr {
                num_fields,
                max_fields: limit,
            });
        }

        let mut registry = self.definitions.lock();
        if registry.contains(&type_name) {
            return Err(RecordDefError::Duplicate(type_name));
        }

        let mut field_table = Dictionary::with_capacity(limit.max(8), 0.75);
        for spec in fields {
            define_field_into(&type_name, &mut field_table, data_size, spec)?;
        }

        if let Some(id) = &id_field {
            match field_table.find(id) {
                Some(f) if is_integer_type(f.field_type) => {}
                _ => return Err(RecordDefError::InvalidIdField(id.clone())),
            }
        }

        let meta = scan_role_meta(&field_table, &registry, "");

        let definition = Arc::new(RecordDefinition {
            type_size: type_name.len() as u32 + 1,
            data_size,
            record_size: RecordDefinition::header_len() + type_name.len() as u32 + 1 + data_size,
            type_name: type_name.clone(),
            id_field,
            fields: field_table,
            meta,
        });

        registry.add(&type_name, definition.clone(), true);
        Ok(definition)
    }

    #[must_use]
    pub fn lookup(&self, type_name: &str) -> Option<Arc<RecordDefinition>> {
        self.definitions.lock().find(type_name).cloned()
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<RecordDefinition>, RecordDefError> {
        self.lookup(type_name)
            .ok_or_else(|| RecordDefError::NotFound(type_name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_integer_type(t: FieldType) -> bool {
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
    )
}

fn define_field_into(
    type_name: &str,
    fields: &mut Dictionary<FieldDef>,
    data_size: u32,
    spec: &FieldSpec,
) -> Result<(), RecordDefError> {
    let def = FieldDef {
        field_type: spec.field_type,
        offset_bits: spec.offset_bits,
        elements: spec.elements,
        exttype: spec.exttype.clone(),
        flags: spec.flags,
    };

    let end = end_of_field(&def);
    if end > data_size {
        return Err(RecordDefError::FieldErr {
            type_name: type_name.to_string(),
            field: spec.name.clone(),
            reason: format!("end_of_field {end} exceeds data_size {data_size}"),
        });
    }

    if fields.contains(&spec.name) {
        // Reported, not propagated (spec §4.2.1: "report but do not fail
        // caller-visibly"); the first definition for the name wins.
        tracing::warn!(type_name, field = %spec.name, "duplicate field name ignored");
        return Ok(());
    }

    fields.add(&spec.name, def, true);
    Ok(())
}

/// Walks a definition's own field table and populates `meta` with the first
/// field seen carrying each role flag, recursing into `User` fields whose
/// `exttype` is already registered (spec §9: registration cycles are
/// refused here, at the post-register scan step, not at `define_field`
/// time).
fn scan_role_meta(
    fields: &Dictionary<FieldDef>,
    registry: &Dictionary<Arc<RecordDefinition>>,
    prefix: &str,
) -> RoleMeta {
    let mut meta = RoleMeta::default();
    let it = fields.iter();
    for i in 0..it.length() {
        let Some((name, field)) = it.get(i) else {
            continue;
        };
        let qualified = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };

        if field.flags.contains(FieldFlags::INDEX) && meta.index_field.is_none() {
            meta.index_field = Some(qualified.clone());
        }
        if field.flags.contains(FieldFlags::TIME) && meta.time_field.is_none() {
            meta.time_field = Some(qualified.clone());
        }
        if field.flags.contains(FieldFlags::X_COORD) && meta.x_coord_field.is_none() {
            meta.x_coord_field = Some(qualified.clone());
        }
        if field.flags.contains(FieldFlags::Y_COORD) && meta.y_coord_field.is_none() {
            meta.y_coord_field = Some(qualified.clone());
        }
        if field.flags.contains(FieldFlags::Z_COORD) && meta.z_coord_field.is_none() {
            meta.z_coord_field = Some(qualified.clone());
        }
        if field.flags.contains(FieldFlags::BATCH) && meta.batch_field.is_none() {
            meta.batch_field = Some(qualified.clone());
        }

        if field.field_type == FieldType::User {
            if let Some(exttype) = &field.exttype {
                if let Some(nested_def) = registry.find(exttype) {
                    let nested = scan_role_meta(&nested_def.fields, registry, &qualified);
                    meta.index_field = meta.index_field.or(nested.index_field);
                    meta.time_field = meta.time_field.or(nested.time_field);
                    meta.x_coord_field = meta.x_coord_field.or(nested.x_coord_field);
                    meta.y_coord_field = meta.y_coord_field.or(nested.y_coord_field);
                    meta.z_coord_field = meta.z_coord_field.or(nested.z_coord_field);
                    meta.batch_field = meta.batch_field.or(nested.batch_field);
                }
                // `exttype` not yet registered: silently skipped, per the
                // cycle-avoidance rule in spec §9.
            }
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_record_rejects_duplicate() {
        let registry = RecordRegistry::new();
        let fields = vec![FieldSpec::new("seq", FieldType::Uint32, 0, 1)];
        registry
            .define_record("ping", None, 4, &fields, MaxFields::Calc)
            .unwrap();
        let err = registry
            .define_record("ping", None, 4, &fields, MaxFields::Calc)
            .unwrap_err();
        assert_eq!(err, RecordDefError::Duplicate("ping".to_string()));
    }

    #[test]
    fn define_record_rejects_field_past_data_size() {
        let registry = RecordRegistry::new();
        let fields = vec![FieldSpec::new("x", FieldType::Uint64, 0, 1)];
        let err = registry
            .define_record("too_small", None, 4, &fields, MaxFields::Calc)
            .unwrap_err();
        assert!(matches!(err, RecordDefError::FieldErr { .. }));
    }

    #[test]
    fn role_meta_is_populated_after_registration() {
        let registry = RecordRegistry::new();
        let fields = vec![
            FieldSpec::new("index", FieldType::Uint64, 0, 1).with_flags(FieldFlags::INDEX),
            FieldSpec::new("n", FieldType::Uint16, 64, 1),
        ];
        let def = registry
            .define_record("extent", Some("index".to_string()), 10, &fields, MaxFields::Calc)
            .unwrap();
        assert_eq!(def.meta.index_field.as_deref(), Some("index"));
    }

    #[test]
    fn invalid_id_field_is_rejected() {
        let registry = RecordRegistry::new();
        let fields = vec![FieldSpec::new("name", FieldType::String, 0, 8)];
        let err = registry
            .define_record("rec", Some("name".to_string()), 8, &fields, MaxFields::Calc)
            .unwrap_err();
        assert_eq!(err, RecordDefError::InvalidIdField("name".to_string()));
    }
}
