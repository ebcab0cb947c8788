use super::*;

/// Size of the whole signature header, including magic and version.
pub const SIGNATURE_HEADER_SIZE_BYTES: usize = 32;
/// Size of the start header (the next-header locator) at its tail.
pub const START_HEADER_SIZE_BYTES: usize = 8 + 8 + 4;

#[derive(Debug, Clone, PartialEq)]
pub struct StartHeader {
    pub next_header_offset: u64,
    pub next_header_size: u64,
    pub next_header_crc: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveVersion {
    pub major: u8,
    pub minor: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureHeader {
    pub archive_version: ArchiveVersion,
    pub start_header_crc: u32,
    pub start_header: StartHeader,
}

/// The fully parsed trailing header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub main_streams: Option<StreamsInfo>,
    pub files: Option<FilesInfo>,
}

/// What the trailing header block turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum NextHeader {
    /// A plain header.
    Header(Header),
    /// A compressed header: one folder whose decoded output is the real header.
    Encoded(StreamsInfo),
}
