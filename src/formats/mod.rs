//! Binary format accessors consumed by the object graph.

pub mod elf;
