//! Core ↔ wire type conversions, kept out of `vmm-core` so the core stays
//! free of any particular transport's serialization shape.

mod conversions;

pub use conversions::*;
