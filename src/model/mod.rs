//! Core data model types.

pub mod raw;
