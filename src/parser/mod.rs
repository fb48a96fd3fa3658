//! MIME decoding: header blocks, field bodies, encoded-words, entity trees
//! and body payloads.

pub mod content;
pub mod encoded_word;
pub mod field_body;
pub mod header;
pub mod mime;
