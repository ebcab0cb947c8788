//! The flattened archive index built from a parsed header.
//!
//! The header stores everything as parallel, implicitly-joined tables; this
//! module resolves them once at open time so lookups during extraction are
//! plain array accesses.

use super::err::ArchiveError;
use crate::parser::types::{Folder, Header, SIGNATURE_HEADER_SIZE_BYTES};

/// One file (or directory) entry with all its properties resolved.
#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub name: String,
    /// Whether the entry has bytes in some folder's output.
    pub has_stream: bool,
    pub is_directory: bool,
    /// An anti-file marks a deletion in incremental backup archives.
    pub is_anti: bool,
    pub size: u64,
    pub crc: Option<u32>,
    pub attributes: Option<u32>,
    pub mtime: Option<u64>,
}

/// Derived lookup tables over the header, in the spirit of the parallel
/// arrays 7zip itself builds after reading a database.
#[derive(Debug, Clone)]
pub(crate) struct ArchiveIndex {
    /// Offset of the pack data region relative to the end of the signature header.
    pub pack_pos: u64,
    pub pack_sizes: Vec<u64>,
    /// Offset of each pack stream inside the pack data region.
    pub pack_stream_offsets: Vec<u64>,
    pub folders: Vec<Folder>,
    pub folder_digests: Vec<Option<u32>>,
    /// Index of each folder's first pack stream in `pack_sizes`.
    pub folder_first_pack_stream: Vec<usize>,
    pub files: Vec<FileEntry>,
    /// Folder each file's bytes live in; `None` for files without a stream.
    pub file_to_folder: Vec<Option<usize>>,
    /// Index of the first file whose bytes live in each folder.
    pub folder_first_file: Vec<usize>,
}

impl ArchiveIndex {
    /// The index of an archive that contains nothing at all.
    pub fn empty() -> ArchiveIndex {
        return ArchiveIndex {
            pack_pos: 0,
            pack_sizes: Vec::new(),
            pack_stream_offsets: Vec::new(),
            folders: Vec::new(),
            folder_digests: Vec::new(),
            folder_first_pack_stream: Vec::new(),
            files: Vec::new(),
            file_to_folder: Vec::new(),
            folder_first_file: Vec::new(),
        };
    }

    pub fn from_header(header: &Header) -> Result<ArchiveIndex, ArchiveError> {
        let mut index = ArchiveIndex::empty();

        let streams = header.main_streams.as_ref();
        if let Some(pack) = streams.and_then(|s| s.pack_info.as_ref()) {
            index.pack_pos = pack.pack_pos;
            index.pack_sizes = pack.sizes.clone();
            let mut offset: u64 = 0;
            for &size in &index.pack_sizes {
                index.pack_stream_offsets.push(offset);
                offset = offset.checked_add(size).ok_or_else(|| {
                    ArchiveError::HeaderCorrupt("pack stream offsets overflow".to_string())
                })?;
            }
        }

        let substreams = streams.and_then(|s| s.substreams_info.as_ref());
        if let Some(coders) = streams.and_then(|s| s.coders_info.as_ref()) {
            index.folders = coders.folders.clone();
            index.folder_digests = coders.folder_digests.clone();
            let mut first = 0usize;
            for folder in &index.folders {
                index.folder_first_pack_stream.push(first);
                first += folder.packed_streams_indices.len();
            }
            if first > index.pack_sizes.len() {
                return Err(ArchiveError::HeaderCorrupt(
                    "folders reference more pack streams than exist".to_string(),
                ));
            }
        }

        // Per-folder sub-stream counts; defaulted by the parser when the
        // archive omits the block.
        let num_substreams: Vec<usize> = match substreams {
            Some(s) => s.num_unpack_streams.clone(),
            None => vec![1; index.folders.len()],
        };
        let substream_sizes: &[u64] = substreams.map(|s| s.sizes.as_slice()).unwrap_or(&[]);
        let substream_digests: &[Option<u32>] =
            substreams.map(|s| s.digests.as_slice()).unwrap_or(&[]);
        if num_substreams.len() != index.folders.len() {
            return Err(ArchiveError::HeaderCorrupt(
                "sub-stream table does not match folder count".to_string(),
            ));
        }

        let files = match header.files.as_ref() {
            Some(f) => f,
            None => return Ok(index),
        };

        // Resolve the file table, handing out sub-streams to the files that
        // carry data, in order.
        let total_substreams: usize = num_substreams.iter().sum();
        let num_with_stream = files.num_files - files.num_empty_streams();
        if num_with_stream != total_substreams
            || substream_sizes.len() != total_substreams
            || substream_digests.len() != total_substreams
        {
            return Err(ArchiveError::HeaderCorrupt(
                "file table does not match sub-stream table".to_string(),
            ));
        }

        index.files.reserve(files.num_files);
        index.file_to_folder.reserve(files.num_files);
        index.folder_first_file = vec![0; index.folders.len()];

        let mut substream_index = 0usize;
        let mut empty_index = 0usize;
        // Walk folders in parallel with the files, skipping folders that
        // carry no sub-streams at all.
        let mut folder_index = 0usize;
        let mut index_in_folder = 0usize;

        for i in 0..files.num_files {
            let name = files.names.get(i).cloned().unwrap_or_default();
            let attributes = files.attributes.get(i).copied().flatten();
            let mtime = files.mtimes.get(i).copied().flatten();

            if files.empty_streams[i] {
                let is_empty_file = files.empty_files[empty_index];
                let is_anti = files.antis[empty_index];
                empty_index += 1;
                index.files.push(FileEntry {
                    name,
                    has_stream: false,
                    is_directory: !is_empty_file && !is_anti,
                    is_anti,
                    size: 0,
                    crc: None,
                    attributes,
                    mtime,
                });
                index.file_to_folder.push(None);
                continue;
            }

            if index_in_folder == 0 {
                // Find the folder this run of files decodes from.
                while folder_index < index.folders.len() && num_substreams[folder_index] == 0 {
                    folder_index += 1;
                }
                if folder_index >= index.folders.len() {
                    return Err(ArchiveError::HeaderCorrupt(
                        "file data without a folder to hold it".to_string(),
                    ));
                }
                index.folder_first_file[folder_index] = i;
            }

            index.files.push(FileEntry {
                name,
                has_stream: true,
                is_directory: false,
                is_anti: false,
                size: substream_sizes[substream_index],
                crc: substream_digests[substream_index],
                attributes,
                mtime,
            });
            index.file_to_folder.push(Some(folder_index));
            substream_index += 1;

            index_in_folder += 1;
            if index_in_folder >= num_substreams[folder_index] {
                index_in_folder = 0;
                folder_index += 1;
            }
        }

        return Ok(index);
    }

    /// The pack stream sizes belonging to one folder, in folder order.
    pub fn folder_pack_sizes(&self, folder_index: usize) -> &[u64] {
        let first = self.folder_first_pack_stream[folder_index];
        let num = self.folders[folder_index].packed_streams_indices.len();
        return &self.pack_sizes[first..first + num];
    }

    /// Absolute offset of a folder's first pack stream in the archive file.
    pub fn folder_base_offset(&self, folder_index: usize) -> Result<u64, ArchiveError> {
        let first = self.folder_first_pack_stream[folder_index];
        return (SIGNATURE_HEADER_SIZE_BYTES as u64)
            .checked_add(self.pack_pos)
            .and_then(|base| base.checked_add(self.pack_stream_offsets[first]))
            .ok_or(ArchiveError::TruncatedInput(
                "pack data offset overflows the file",
            ));
    }

    /// Byte offset of a file inside its folder's decoded output: the sum of
    /// the sizes of all earlier files in the same folder.
    pub fn file_offset_in_folder(&self, file_index: usize, folder_index: usize) -> u64 {
        let first = self.folder_first_file[folder_index];
        return self.files[first..file_index]
            .iter()
            .filter(|f| f.has_stream)
            .map(|f| f.size)
            .sum();
    }
}
