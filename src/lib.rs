//! `mimetree` — decode RFC 822 / MIME messages into entity trees.
//!
//! The core lives in [`parser`]: header blocks, RFC 2045 field bodies with
//! RFC 2231 continuations, RFC 2047 encoded-words, recursive multipart
//! splitting and body payload decoding. [`source`] splits mailbox files into
//! raw messages and [`export`] writes attachments to disk.

pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod source;
