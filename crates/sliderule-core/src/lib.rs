//! Dictionary, record registry, message-queue fabric, and record dispatcher
//! for the SlideRule core (spec §1–§4).
//!
//! `sliderule-core` denies `unsafe`; the raw byte/bit mechanics it needs live
//! in [`sliderule_membrane`].

pub mod config;
pub mod dictionary;
pub mod dispatch;
pub mod msgq;
pub mod record;

pub use dictionary::{Dictionary, DictIter, ManagedDictionary};
pub use dispatch::{
    CreateRecordFn, DispatchError, DispatchHandler, KeyMode, OutgoingRecord, RecordDispatcher, default_create_record,
    lookup_key_calc, register_key_calc,
};
pub use msgq::{Publisher, QState, QueueDisplay, QueueSize, Subscriber, SubscriberType, Timeout, list_queues};
pub use record::{
    FieldDef, FieldFlags, FieldSpec, FieldType, MaxFields, RecordDefError, RecordDefinition, RecordError,
    RecordObject, RecordRegistry, RoleMeta, Severity,
};
