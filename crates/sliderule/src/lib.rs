//! Public facade over the SlideRule record and messaging core.
//!
//! Applications depend on this crate rather than `sliderule-core` directly,
//! the way the original library exposed one `sliderule.h` over its
//! `core`/`ccsds`/`icesat2` packages. For now the facade simply re-exports
//! the core's public surface; module-specific facades (plugins, readers)
//! would be added here as siblings without disturbing `sliderule-core`'s own
//! layout.

pub use sliderule_core::{
    CreateRecordFn, DictIter, Dictionary, DispatchError, DispatchHandler, FieldDef, FieldFlags, FieldSpec, FieldType,
    KeyMode, ManagedDictionary, MaxFields, OutgoingRecord, Publisher, QState, QueueDisplay, QueueSize, RecordDefError,
    RecordDefinition, RecordDispatcher, RecordError, RecordObject, RecordRegistry, RoleMeta, Severity, Subscriber,
    SubscriberType, Timeout, config, default_create_record, list_queues, lookup_key_calc, record, register_key_calc,
};

pub use sliderule_membrane as membrane;

/// Initializes process-wide logging the way a `sliderule-harness` binary or
/// an embedding application would at startup (spec §6.4's "ambient
/// tracing-subscriber init").
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
