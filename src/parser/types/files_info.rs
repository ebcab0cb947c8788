use bitvec::prelude::*;

/// The file table of the archive, with every property resolved to
/// per-file values.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesInfo {
    pub num_files: usize,
    /// One bit per file: set when the file carries no data stream
    /// (directories and empty files).
    pub empty_streams: BitVec,
    /// One bit per empty-stream entry: set when it is a zero-byte file
    /// rather than a directory.
    pub empty_files: BitVec,
    /// One bit per empty-stream entry: set for anti-files (deletion markers
    /// written by incremental backups).
    pub antis: BitVec,
    /// Decoded file names. Empty when the archive carries no name table.
    pub names: Vec<String>,
    /// Windows attribute word per file, where defined.
    pub attributes: Vec<Option<u32>>,
    /// Modification time per file (Windows FILETIME), where defined.
    pub mtimes: Vec<Option<u64>>,
}

impl FilesInfo {
    pub fn num_empty_streams(&self) -> usize {
        return self.empty_streams.count_ones();
    }
}
