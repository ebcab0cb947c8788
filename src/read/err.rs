use crate::codec::CodecError;
use crate::parser::err::{SevenZParserError, SevenZParserErrorKind};

use thiserror::Error;

/// Everything that can go wrong while opening or reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input doesn't begin with the 7z signature.
    #[error("not a 7z archive")]
    NotAnArchive,
    /// The signature is fine but the format version is one we don't read.
    #[error("unsupported archive format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    /// A stored header checksum doesn't match the header bytes.
    #[error("header CRC mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    HeaderCrcMismatch { expected: u32, computed: u32 },
    /// A stored data checksum doesn't match the decoded bytes.
    #[error("data CRC mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },
    /// The input ends before data the header points at.
    #[error("truncated archive: {0}")]
    TruncatedInput(&'static str),
    /// The header is structurally invalid.
    #[error("corrupt archive header: {0}")]
    HeaderCorrupt(String),
    /// The header is well-formed but uses a feature we don't read.
    #[error("unsupported archive feature: {0}")]
    UnsupportedArchive(&'static str),
    /// A folder's coder wiring falls outside the pipelines we can decode.
    #[error("unsupported coder graph: {0}")]
    UnsupportedCoderGraph(&'static str),
    /// A compressed stream is internally inconsistent.
    #[error("corrupt stream data: {0}")]
    DataCorrupt(&'static str),
    /// The caller passed an argument that doesn't fit this archive.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CodecError> for ArchiveError {
    fn from(e: CodecError) -> ArchiveError {
        return match e {
            CodecError::UnsupportedCodecID(_) => {
                ArchiveError::UnsupportedCoderGraph("unknown coder method")
            }
            CodecError::InvalidProperties => {
                ArchiveError::HeaderCorrupt("invalid coder properties".to_string())
            }
            CodecError::Corrupt(what) => ArchiveError::DataCorrupt(what),
            CodecError::Truncated => ArchiveError::DataCorrupt("compressed stream ended early"),
            CodecError::SizeMismatch { .. } => {
                ArchiveError::DataCorrupt("stored stream size mismatch")
            }
        };
    }
}

/// Collapses a nom parse error into the public error type, carrying the
/// innermost context label along for corrupt headers.
pub(crate) fn map_parser_err(e: nom::Err<SevenZParserError<&[u8]>>) -> ArchiveError {
    let inner = match e {
        nom::Err::Incomplete(_) => {
            return ArchiveError::TruncatedInput("header ended unexpectedly")
        }
        nom::Err::Error(inner) | nom::Err::Failure(inner) => inner,
    };
    let ctx = inner.ctx.first().map(|(_, c)| *c).unwrap_or("header");
    return match inner.kind {
        SevenZParserErrorKind::BadSignature(_) => ArchiveError::NotAnArchive,
        SevenZParserErrorKind::UnsupportedVersion { major, minor } => {
            ArchiveError::UnsupportedVersion { major, minor }
        }
        SevenZParserErrorKind::Crc(expected, computed) => {
            ArchiveError::HeaderCrcMismatch { expected, computed }
        }
        SevenZParserErrorKind::Unsupported(what) => ArchiveError::UnsupportedArchive(what),
        SevenZParserErrorKind::Nom(_, kind) => {
            ArchiveError::HeaderCorrupt(format!("parse error {:?} in {}", kind, ctx))
        }
        SevenZParserErrorKind::InvalidPropertyID(id) => {
            ArchiveError::HeaderCorrupt(format!("invalid property ID {:#04x} in {}", id, ctx))
        }
        SevenZParserErrorKind::UnexpectedPropertyID(id) => {
            ArchiveError::HeaderCorrupt(format!("unexpected property ID {:#04x} in {}", id, ctx))
        }
        SevenZParserErrorKind::ToUsizeConversionFailure(_) => {
            ArchiveError::HeaderCorrupt(format!("value too large for this platform in {}", ctx))
        }
        SevenZParserErrorKind::NumberTooLarge(v) => {
            ArchiveError::HeaderCorrupt(format!("implausible count {} in {}", v, ctx))
        }
        SevenZParserErrorKind::InvalidBooleanByte(b) => {
            ArchiveError::HeaderCorrupt(format!("invalid boolean byte {:#04x} in {}", b, ctx))
        }
        SevenZParserErrorKind::NameNotUtf16 => {
            ArchiveError::HeaderCorrupt(format!("file name is not valid UTF-16 in {}", ctx))
        }
        SevenZParserErrorKind::OddNameLength(n) => {
            ArchiveError::HeaderCorrupt(format!("odd name table length {} in {}", n, ctx))
        }
        SevenZParserErrorKind::SubstreamSizeMismatch => {
            ArchiveError::HeaderCorrupt(format!("sub-stream sizes exceed folder size in {}", ctx))
        }
    };
}
