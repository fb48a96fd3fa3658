//! Export functionality: attachment extraction.

pub mod attachment;
