//! Folder decoding: turns a folder's pack streams into its unpacked bytes.
//!
//! Only three coder wirings ever come out of 7zip's encoder for the methods
//! we read, so rather than evaluating arbitrary graphs, the folder is
//! classified into one of those shapes and decoded by a matching pipeline.

use super::err::ArchiveError;
use crate::codec::{self, Codec, Codecs, MethodId};
use crate::parser::crc::sevenz_crc;
use crate::parser::types::{BindPair, Folder};

use std::io::{Read, Seek, SeekFrom};

/// The coder wirings we know how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineShape {
    /// A single main coder fed by the only pack stream.
    Single,
    /// A main coder whose output runs through one branch-converter filter.
    Filtered(MethodId),
    /// Three main coders and a BCJ2 merge coder over four pack streams.
    Bcj2,
}

fn method_of(folder: &Folder, coder_index: usize) -> Result<MethodId, ArchiveError> {
    return MethodId::from_bytes(&folder.coders[coder_index].id)
        .ok_or(ArchiveError::UnsupportedCoderGraph("unknown coder method"));
}

fn is_simple(folder: &Folder, coder_index: usize) -> bool {
    let c = &folder.coders[coder_index];
    return c.num_in_streams() == 1 && c.num_out_streams() == 1;
}

/// Matches a folder against the supported shapes, checking the full wiring:
/// stream counts, bind pairs and pack stream order all have to line up with
/// what the encoder writes.
pub(crate) fn classify(folder: &Folder, num_pack_streams: usize) -> Result<PipelineShape, ArchiveError> {
    match folder.coders.len() {
        1 => {
            if !method_of(folder, 0)?.is_main() || !is_simple(folder, 0) {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "single coder is not a main codec",
                ));
            }
            if !folder.bind_pairs.is_empty()
                || folder.packed_streams_indices != [0]
                || num_pack_streams != 1
            {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "unexpected wiring for a single coder",
                ));
            }
            return Ok(PipelineShape::Single);
        }
        2 => {
            let main = method_of(folder, 0)?;
            let filter = method_of(folder, 1)?;
            if !main.is_main() || !filter.is_branch_filter() {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "two-coder folder is not main + branch filter",
                ));
            }
            if !is_simple(folder, 0) || !is_simple(folder, 1) {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "filter coder with unexpected stream counts",
                ));
            }
            // The filter's input (global stream 1) is bound to the main
            // coder's output (global stream 0); the pack stream feeds main.
            if folder.bind_pairs
                != [BindPair {
                    in_index: 1,
                    out_index: 0,
                }]
                || folder.packed_streams_indices != [0]
                || num_pack_streams != 1
            {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "unexpected wiring for a filtered folder",
                ));
            }
            return Ok(PipelineShape::Filtered(filter));
        }
        4 => {
            for i in 0..3 {
                if !method_of(folder, i)?.is_main() || !is_simple(folder, i) {
                    return Err(ArchiveError::UnsupportedCoderGraph(
                        "BCJ2 folder with unexpected inner coders",
                    ));
                }
            }
            let merge = &folder.coders[3];
            if method_of(folder, 3)? != MethodId::Bcj2
                || merge.num_in_streams() != 4
                || merge.num_out_streams() != 1
            {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "four-coder folder is not BCJ2",
                ));
            }
            // Global inputs 0..=2 feed coders 0..=2, 3..=6 feed the merge
            // coder; the encoder always writes exactly this layout.
            let expected_binds = [
                BindPair {
                    in_index: 5,
                    out_index: 0,
                },
                BindPair {
                    in_index: 4,
                    out_index: 1,
                },
                BindPair {
                    in_index: 3,
                    out_index: 2,
                },
            ];
            if folder.bind_pairs != expected_binds
                || folder.packed_streams_indices != [2, 6, 1, 0]
                || num_pack_streams != 4
            {
                return Err(ArchiveError::UnsupportedCoderGraph(
                    "unexpected wiring for a BCJ2 folder",
                ));
            }
            return Ok(PipelineShape::Bcj2);
        }
        _ => {
            return Err(ArchiveError::UnsupportedCoderGraph(
                "unsupported number of coders",
            ))
        }
    }
}

/// Reads one pack stream into memory, given the folder's first stream offset.
fn read_pack_stream<R: Read + Seek>(
    reader: &mut R,
    base_offset: u64,
    pack_sizes: &[u64],
    stream: usize,
) -> Result<Vec<u8>, ArchiveError> {
    let mut offset = base_offset;
    for &size in &pack_sizes[..stream] {
        offset = offset
            .checked_add(size)
            .ok_or(ArchiveError::TruncatedInput("pack data offset overflows the file"))?;
    }
    let size = usize::try_from(pack_sizes[stream])
        .map_err(|_| ArchiveError::UnsupportedArchive("pack stream too large for this platform"))?;

    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return ArchiveError::TruncatedInput("pack stream ends beyond the file");
        }
        return ArchiveError::Io(e);
    })?;
    return Ok(buf);
}

fn output_size(folder: &Folder, out_stream: usize) -> Result<usize, ArchiveError> {
    let size = folder.unpack_sizes.get(out_stream).copied().ok_or_else(|| {
        ArchiveError::HeaderCorrupt("missing unpack size for coder output".to_string())
    })?;
    return usize::try_from(size)
        .map_err(|_| ArchiveError::UnsupportedArchive("folder too large for this platform"));
}

/// Runs one main coder over one pack stream into a freshly sized buffer.
fn decode_main<R: Read + Seek>(
    reader: &mut R,
    folder: &Folder,
    base_offset: u64,
    pack_sizes: &[u64],
    coder_index: usize,
    pack_stream: usize,
) -> Result<Vec<u8>, ArchiveError> {
    let input = read_pack_stream(reader, base_offset, pack_sizes, pack_stream)?;
    let mut out = vec![0u8; output_size(folder, coder_index)?];
    let codec = Codecs::for_coder(&folder.coders[coder_index])?;
    codec.decode(&input, &mut out)?;
    return Ok(out);
}

/// Decodes a whole folder into memory and verifies its CRC if one is stored.
pub(crate) fn decode_folder<R: Read + Seek>(
    reader: &mut R,
    folder: &Folder,
    pack_sizes: &[u64],
    base_offset: u64,
    digest: Option<u32>,
) -> Result<Vec<u8>, ArchiveError> {
    if pack_sizes.len() != folder.packed_streams_indices.len() {
        return Err(ArchiveError::HeaderCorrupt(
            "folder pack stream count does not match pack sizes".to_string(),
        ));
    }
    let shape = classify(folder, pack_sizes.len())?;

    let out = match shape {
        PipelineShape::Single => decode_main(reader, folder, base_offset, pack_sizes, 0, 0)?,
        PipelineShape::Filtered(filter) => {
            // Branch filters rewrite in place, so both sizes must agree.
            if output_size(folder, 0)? != output_size(folder, 1)? {
                return Err(ArchiveError::HeaderCorrupt(
                    "branch filter changes the stream size".to_string(),
                ));
            }
            let mut out = decode_main(reader, folder, base_offset, pack_sizes, 0, 0)?;
            match filter {
                MethodId::BcjX86 => {
                    let mut state = 0;
                    codec::x86_decode(&mut out, 0, &mut state);
                }
                MethodId::BcjArm => {
                    codec::arm_decode(&mut out, 0);
                }
                _ => {
                    return Err(ArchiveError::UnsupportedCoderGraph(
                        "unexpected branch filter",
                    ))
                }
            }
            out
        }
        PipelineShape::Bcj2 => {
            // Pack streams in file order: main data, control, calls, jumps.
            // Coder 2 decodes the main stream, coder 1 the calls, coder 0
            // the jumps; the control stream stays range-coded as stored.
            let main = decode_main(reader, folder, base_offset, pack_sizes, 2, 0)?;
            let call = decode_main(reader, folder, base_offset, pack_sizes, 1, 2)?;
            let jump = decode_main(reader, folder, base_offset, pack_sizes, 0, 3)?;
            let control = read_pack_stream(reader, base_offset, pack_sizes, 1)?;

            let mut out = vec![0u8; output_size(folder, 3)?];
            codec::bcj2_decode(&main, &call, &jump, &control, &mut out)?;
            out
        }
    };

    if let Some(expected) = digest {
        let computed = sevenz_crc(&out);
        if computed != expected {
            return Err(ArchiveError::CrcMismatch { expected, computed });
        }
    }
    return Ok(out);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::types::{Coder, CoderComplex};

    fn simple_coder(id: &[u8]) -> Coder {
        return Coder {
            complex: None,
            attrs: None,
            id: id.to_vec(),
        };
    }

    fn copy_folder() -> Folder {
        return Folder {
            coders: vec![simple_coder(&[0x00])],
            bind_pairs: vec![],
            packed_streams_indices: vec![0],
            unpack_sizes: vec![10],
        };
    }

    fn bcj2_folder() -> Folder {
        let mut merge = simple_coder(&[0x03, 0x03, 0x01, 0x1B]);
        merge.complex = Some(CoderComplex {
            num_in_streams: 4,
            num_out_streams: 1,
        });
        return Folder {
            coders: vec![
                simple_coder(&[0x03, 0x01, 0x01]),
                simple_coder(&[0x03, 0x01, 0x01]),
                simple_coder(&[0x21]),
                merge,
            ],
            bind_pairs: vec![
                BindPair {
                    in_index: 5,
                    out_index: 0,
                },
                BindPair {
                    in_index: 4,
                    out_index: 1,
                },
                BindPair {
                    in_index: 3,
                    out_index: 2,
                },
            ],
            packed_streams_indices: vec![2, 6, 1, 0],
            unpack_sizes: vec![4, 4, 100, 108],
        };
    }

    #[test]
    fn classify_single_copy() {
        assert_eq!(classify(&copy_folder(), 1).unwrap(), PipelineShape::Single);
    }

    #[test]
    fn classify_rejects_unknown_method() {
        let mut folder = copy_folder();
        folder.coders[0].id = vec![0x06, 0xF1, 0x07, 0x01];
        assert!(matches!(
            classify(&folder, 1),
            Err(ArchiveError::UnsupportedCoderGraph(_))
        ));
    }

    #[test]
    fn classify_filtered() {
        let folder = Folder {
            coders: vec![
                simple_coder(&[0x03, 0x01, 0x01]),
                simple_coder(&[0x03, 0x03, 0x01, 0x03]),
            ],
            bind_pairs: vec![BindPair {
                in_index: 1,
                out_index: 0,
            }],
            packed_streams_indices: vec![0],
            unpack_sizes: vec![100, 100],
        };
        assert_eq!(
            classify(&folder, 1).unwrap(),
            PipelineShape::Filtered(MethodId::BcjX86)
        );
    }

    #[test]
    fn classify_bcj2() {
        assert_eq!(classify(&bcj2_folder(), 4).unwrap(), PipelineShape::Bcj2);
    }

    #[test]
    fn classify_rejects_reordered_bcj2_pack_streams() {
        let mut folder = bcj2_folder();
        folder.packed_streams_indices = vec![0, 1, 2, 6];
        assert!(matches!(
            classify(&folder, 4),
            Err(ArchiveError::UnsupportedCoderGraph(
                "unexpected wiring for a BCJ2 folder"
            ))
        ));
    }

    #[test]
    fn classify_rejects_rewired_bcj2_bind_pairs() {
        let mut folder = bcj2_folder();
        folder.bind_pairs[0].in_index = 6;
        assert!(matches!(
            classify(&folder, 4),
            Err(ArchiveError::UnsupportedCoderGraph(_))
        ));
    }

    #[test]
    fn classify_rejects_wrong_pack_count() {
        assert!(matches!(
            classify(&copy_folder(), 2),
            Err(ArchiveError::UnsupportedCoderGraph(_))
        ));
    }
}
