//! Parsing of the 7z container format.
//!
//! Everything in here operates on in-memory byte slices; actual file I/O and
//! folder decoding live in the `read` module.

pub(crate) mod crc;
pub(crate) mod err;
pub(crate) mod parsers;
pub(crate) mod types;
