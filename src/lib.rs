#![forbid(unsafe_code)]
//! A crate for reading 7zip archives.
//!
//! Supports the stored (Copy), LZMA, LZMA2, BCJ (x86), ARM and BCJ2 decoding
//! pipelines, solid folders with a single-folder decode cache, compressed
//! (encoded) headers and CRC32 integrity checks.
//!
//! The main entry point is [`read::Archive`].

#![allow(clippy::needless_return)]

mod codec;
mod parser;
pub mod read;

pub use read::{Archive, ArchiveError, FileTag, ListedFile};
