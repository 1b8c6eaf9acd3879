//! Byte- and bit-level record memory primitives for the SlideRule core.
//!
//! This crate holds the mechanics a record needs to exist as raw bytes:
//! endian swapping, big-endian bit-field pack/unpack, pointer-field views
//! into a record's own payload, and the owned-vs-aliased buffer that lets a
//! record either allocate its own memory or alias a queue node's.
//!
//! `unsafe` is confined to this crate. `sliderule-core` denies it and
//! delegates all raw memory work down here.

pub mod bitfield;
pub mod endian;
pub mod memory;
pub mod pointer;

pub use bitfield::{BitFieldError, pack_bit_field, unpack_bit_field};
pub use memory::RecordMemory;
pub use pointer::{PointerError, pointer_view};
