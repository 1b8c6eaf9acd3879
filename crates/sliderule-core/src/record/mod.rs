//! Self-describing versioned binary records (spec §3, §4.2).

pub mod definition;
pub mod error;
pub mod field;
pub mod object;

pub use definition::{FieldSpec, MaxFields, RecordDefError, RecordDefinition, RoleMeta, RecordRegistry};
pub use error::{RecordError, Severity};
pub use field::{FieldDef, FieldFlags, FieldType, end_of_field};
pub use object::RecordObject;
