//! This module implements an interface for reading 7zip archives.

mod decode;
mod err;
mod index;
mod list;

pub use err::ArchiveError;
pub use list::{FileTag, ListedFile};

use crate::parser::crc::sevenz_crc;
use crate::parser::parsers::{self, MAGIC};
use crate::parser::types::{NextHeader, SignatureHeader, StreamsInfo, SIGNATURE_HEADER_SIZE_BYTES};
use err::map_parser_err;
use index::ArchiveIndex;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// An opened 7z archive.
///
/// Opening parses and validates the whole header; the pack data itself is
/// only read when files are extracted. Extraction decodes one folder at a
/// time and keeps the most recently decoded folder around, so pulling the
/// files of a solid block out one after another decodes it only once.
pub struct Archive<R: Read + Seek> {
    reader: R,
    index: ArchiveIndex,
    cache: Option<DecodedFolder>,
}

struct DecodedFolder {
    folder_index: usize,
    data: Vec<u8>,
}

impl Archive<BufReader<File>> {
    /// Opens an archive file from a path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Archive<BufReader<File>>, ArchiveError> {
        let file = File::open(path)?;
        return Archive::open(BufReader::new(file));
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Opens an archive from any seekable stream.
    pub fn open(mut reader: R) -> Result<Archive<R>, ArchiveError> {
        let signature = read_signature_header(&mut reader)?;
        let start = signature.start_header;

        // An empty archive stores no trailing header at all.
        if start.next_header_size == 0 {
            return Ok(Archive {
                reader,
                index: ArchiveIndex::empty(),
                cache: None,
            });
        }

        let stream_len = reader.seek(SeekFrom::End(0))?;
        let header_offset = (SIGNATURE_HEADER_SIZE_BYTES as u64)
            .checked_add(start.next_header_offset)
            .ok_or(ArchiveError::TruncatedInput("header offset overflows the file"))?;
        let header_end = header_offset
            .checked_add(start.next_header_size)
            .ok_or(ArchiveError::TruncatedInput("header offset overflows the file"))?;
        if header_end > stream_len {
            return Err(ArchiveError::TruncatedInput(
                "header lies beyond the end of the file",
            ));
        }
        let header_size = usize::try_from(start.next_header_size)
            .map_err(|_| ArchiveError::UnsupportedArchive("header too large for this platform"))?;

        reader.seek(SeekFrom::Start(header_offset))?;
        let mut raw_header = vec![0u8; header_size];
        reader.read_exact(&mut raw_header)?;

        let computed = sevenz_crc(&raw_header);
        if computed != start.next_header_crc {
            return Err(ArchiveError::HeaderCrcMismatch {
                expected: start.next_header_crc,
                computed,
            });
        }

        // The trailing header may itself be stored compressed, exactly one
        // level deep.
        let header = match parse_next_header(&raw_header)? {
            NextHeader::Header(h) => h,
            NextHeader::Encoded(streams) => {
                let decoded = decode_header_folder(&mut reader, &streams)?;
                match parse_next_header(&decoded)? {
                    NextHeader::Header(h) => h,
                    NextHeader::Encoded(_) => {
                        return Err(ArchiveError::UnsupportedArchive(
                            "nested encoded headers",
                        ))
                    }
                }
            }
        };

        let index = ArchiveIndex::from_header(&header)?;
        return Ok(Archive {
            reader,
            index,
            cache: None,
        });
    }

    /// Number of entries in the archive, directories included.
    pub fn file_count(&self) -> usize {
        return self.index.files.len();
    }

    fn entry(&self, file_index: usize) -> Result<&index::FileEntry, ArchiveError> {
        return self
            .index
            .files
            .get(file_index)
            .ok_or(ArchiveError::InvalidArgument("file index out of range"));
    }

    pub fn file_name(&self, file_index: usize) -> Result<&str, ArchiveError> {
        return Ok(&self.entry(file_index)?.name);
    }

    /// Unpacked size of the entry. Directories and empty files report 0.
    pub fn file_size(&self, file_index: usize) -> Result<u64, ArchiveError> {
        return Ok(self.entry(file_index)?.size);
    }

    pub fn file_is_directory(&self, file_index: usize) -> Result<bool, ArchiveError> {
        return Ok(self.entry(file_index)?.is_directory);
    }

    /// Whether the entry is an anti-file (a deletion marker written by
    /// incremental backup archives). Anti-files carry no data.
    pub fn file_is_anti(&self, file_index: usize) -> Result<bool, ArchiveError> {
        return Ok(self.entry(file_index)?.is_anti);
    }

    /// Windows attribute bits, if the archive stores them for this entry.
    pub fn file_attributes(&self, file_index: usize) -> Result<Option<u32>, ArchiveError> {
        return Ok(self.entry(file_index)?.attributes);
    }

    /// Modification time as a Windows FILETIME, if stored.
    pub fn file_mtime(&self, file_index: usize) -> Result<Option<u64>, ArchiveError> {
        return Ok(self.entry(file_index)?.mtime);
    }

    /// Extracts one file into memory.
    ///
    /// Directories and empty files come back as an empty buffer. When the
    /// file carries a CRC, the extracted bytes are verified against it.
    pub fn extract(&mut self, file_index: usize) -> Result<Vec<u8>, ArchiveError> {
        let (size, crc) = {
            let entry = self.entry(file_index)?;
            (entry.size, entry.crc)
        };
        // Directories, empty files and anti-files all carry no stream.
        let folder_index = match self.index.file_to_folder[file_index] {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };

        if self.cache.as_ref().map(|c| c.folder_index) != Some(folder_index) {
            // Drop the old folder before decoding, never alongside.
            self.cache = None;
            let folder = &self.index.folders[folder_index];
            let data = decode::decode_folder(
                &mut self.reader,
                folder,
                self.index.folder_pack_sizes(folder_index),
                self.index.folder_base_offset(folder_index)?,
                self.index.folder_digests[folder_index],
            )?;
            self.cache = Some(DecodedFolder { folder_index, data });
        }
        let data = match &self.cache {
            Some(c) => &c.data,
            None => return Err(ArchiveError::InvalidArgument("decode cache missing")),
        };

        let offset = self.index.file_offset_in_folder(file_index, folder_index);
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= data.len() as u64)
            .ok_or_else(|| {
                ArchiveError::HeaderCorrupt("file range exceeds its folder".to_string())
            })?;
        let bytes = data[offset as usize..end as usize].to_vec();

        if let Some(expected) = crc {
            let computed = sevenz_crc(&bytes);
            if computed != expected {
                return Err(ArchiveError::CrcMismatch { expected, computed });
            }
        }
        return Ok(bytes);
    }

    /// Extracts one file straight to a filesystem path.
    pub fn extract_to_path<P: AsRef<Path>>(
        &mut self,
        file_index: usize,
        dest: P,
    ) -> Result<(), ArchiveError> {
        let data = self.extract(file_index)?;
        let mut file = File::create(dest)?;
        file.write_all(&data)?;
        return Ok(());
    }
}

/// Reads and validates the 32-byte signature header.
///
/// The magic bytes are checked before completeness, so that a short file
/// that never was a 7z archive reports as such rather than as truncated.
fn read_signature_header<R: Read>(reader: &mut R) -> Result<SignatureHeader, ArchiveError> {
    let mut raw = [0u8; SIGNATURE_HEADER_SIZE_BYTES];
    let filled = read_up_to(reader, &mut raw)?;
    if filled < MAGIC.len() || raw[..MAGIC.len()] != MAGIC {
        return Err(ArchiveError::NotAnArchive);
    }
    if filled < raw.len() {
        return Err(ArchiveError::TruncatedInput(
            "file ends inside the signature header",
        ));
    }
    let (_, signature) = parsers::signature_header(&raw).map_err(map_parser_err)?;
    return Ok(signature);
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ArchiveError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::Io(e)),
        }
    }
    return Ok(filled);
}

fn parse_next_header(raw: &[u8]) -> Result<NextHeader, ArchiveError> {
    return parsers::next_header(raw)
        .map(|(_, h)| h)
        .map_err(map_parser_err);
}

/// Decodes the single folder holding a compressed header.
fn decode_header_folder<R: Read + Seek>(
    reader: &mut R,
    streams: &StreamsInfo,
) -> Result<Vec<u8>, ArchiveError> {
    let pack = streams.pack_info.as_ref().ok_or_else(|| {
        ArchiveError::HeaderCorrupt("encoded header without pack info".to_string())
    })?;
    let coders = streams.coders_info.as_ref().ok_or_else(|| {
        ArchiveError::HeaderCorrupt("encoded header without folder info".to_string())
    })?;
    if coders.folders.len() != 1 {
        return Err(ArchiveError::UnsupportedArchive(
            "encoded header spanning multiple folders",
        ));
    }
    let folder = &coders.folders[0];
    let base_offset = (SIGNATURE_HEADER_SIZE_BYTES as u64)
        .checked_add(pack.pack_pos)
        .ok_or(ArchiveError::TruncatedInput("header offset overflows the file"))?;
    return decode::decode_folder(
        reader,
        folder,
        &pack.sizes,
        base_offset,
        coders.folder_digests[0],
    );
}
