use super::*;
use crate::parser::err::*;
use crate::parser::types::*;

use nom::error::context;
use nom::multi::count;
use nom::number::complete::le_u32;

/// Cheap bound before allocating an `n`-element vector: every item occupies
/// at least one input byte, so larger counts cannot possibly parse.
pub(crate) fn check_count<'a>(
    input: &'a [u8],
    n: usize,
) -> Result<(), nom::Err<SevenZParserError<&'a [u8]>>> {
    if n > input.len() {
        return Err(nom::Err::Error(SevenZParserError::new(
            SevenZParserErrorKind::Nom(input, nom::error::ErrorKind::Eof),
        )));
    }
    return Ok(());
}

/// Reads a defined-or-not bitmap followed by one CRC per defined item.
pub fn hash_digests(input: &[u8], num: usize) -> SevenZResult<Vec<Option<u32>>> {
    check_count(input, num / 8)?;
    let (input, defined) = context("hash_digests defined", |x| take_bitvec_or_all_set(x, num))(input)?;
    let mut input_mut = input;
    let mut digests: Vec<Option<u32>> = Vec::with_capacity(num);
    for i in 0..num {
        if defined[i] {
            let (input, digest) = context("hash_digests digest", le_u32)(input_mut)?;
            input_mut = input;
            digests.push(Some(digest));
        } else {
            digests.push(None);
        }
    }
    return Ok((input_mut, digests));
}

/// Parses the PackInfo block. The `PackInfo` property ID itself has already
/// been consumed by the caller's dispatch loop.
pub fn pack_info(input: &[u8]) -> SevenZResult<PackInfo> {
    let (input, pack_pos) = context("pack_info pack_pos", sevenz_uint64)(input)?;
    let (input, num_pack_streams) =
        context("pack_info num_pack_streams", sevenz_uint64_as_u32)(input)?;
    let num_pack_streams = num_pack_streams as usize;
    check_count(input, num_pack_streams)?;

    let (input, _) = context("pack_info wait for kSize", |x| {
        wait_for_property_id(x, PropertyID::Size)
    })(input)?;
    let (input, sizes) = context(
        "pack_info sizes",
        count(sevenz_uint64, num_pack_streams),
    )(input)?;

    let mut crcs: Vec<Option<u32>> = Vec::new();
    let mut input_mut = input;
    loop {
        let (input, tag) = context("pack_info id", property_tag)(input_mut)?;
        input_mut = input;
        match tag {
            PropertyTag::Known(PropertyID::End) => break,
            PropertyTag::Known(PropertyID::CRC) => {
                let (input, digests) =
                    context("pack_info crcs", |x| hash_digests(x, num_pack_streams))(input_mut)?;
                crcs = digests;
                input_mut = input;
            }
            _ => {
                let (input, _) = context("pack_info skip", skip_property_data)(input_mut)?;
                input_mut = input;
            }
        }
    }

    return Ok((
        input_mut,
        PackInfo {
            pack_pos,
            sizes,
            crcs,
        },
    ));
}

/// Parses the SubStreamsInfo block and resolves it against the folders:
/// derived last sizes, digests inherited from single-stream folders.
pub fn substreams_info<'a>(
    input: &'a [u8],
    coders: &CodersInfo,
) -> SevenZResult<'a, SubStreamsInfo> {
    let folders = &coders.folders;
    let num_folders = folders.len();

    let (input, mut tag) = context("substreams_info id", property_tag)(input)?;
    let mut input_mut = input;

    // Per-folder stream counts, default 1.
    let num_unpack_streams: Vec<usize>;
    if tag == PropertyTag::Known(PropertyID::NumUnPackStream) {
        let mut nums = Vec::with_capacity(num_folders);
        for _ in 0..num_folders {
            let (input, n) =
                context("substreams_info num_unpack_streams", sevenz_uint64_as_u32)(input_mut)?;
            input_mut = input;
            nums.push(n as usize);
        }
        num_unpack_streams = nums;
        let (input, next_tag) = context("substreams_info id", property_tag)(input_mut)?;
        input_mut = input;
        tag = next_tag;
    } else {
        num_unpack_streams = vec![1; num_folders];
    }

    // Sub-stream sizes. All but the last per folder are explicit;
    // the last is whatever remains of the folder.
    let mut sizes: Vec<u64> = Vec::new();
    if tag == PropertyTag::Known(PropertyID::Size) {
        for (folder_index, &num) in num_unpack_streams.iter().enumerate() {
            if num == 0 {
                continue;
            }
            let mut sum: u64 = 0;
            for _ in 0..(num - 1) {
                let (input, size) = context("substreams_info size", sevenz_uint64)(input_mut)?;
                input_mut = input;
                sizes.push(size);
                sum = match sum.checked_add(size) {
                    Some(s) => s,
                    None => {
                        return Err(nom::Err::Failure(SevenZParserError::new(
                            SevenZParserErrorKind::SubstreamSizeMismatch,
                        )))
                    }
                };
            }
            let total = folders[folder_index].unpack_size();
            if sum > total {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::SubstreamSizeMismatch,
                )));
            }
            sizes.push(total - sum);
        }
        let (input, next_tag) = context("substreams_info id", property_tag)(input_mut)?;
        input_mut = input;
        tag = next_tag;
    } else {
        for (folder_index, &num) in num_unpack_streams.iter().enumerate() {
            if num == 0 {
                continue;
            }
            // Splitting a folder requires explicit sizes.
            if num != 1 {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::SubstreamSizeMismatch,
                )));
            }
            sizes.push(folders[folder_index].unpack_size());
        }
    }

    // Digests. Folders that consist of exactly one sub-stream and already
    // declare a folder CRC don't get a fresh digest; everyone else does.
    let inherits_folder_digest = |folder_index: usize| {
        num_unpack_streams[folder_index] == 1 && coders.folder_digests[folder_index].is_some()
    };

    let mut digests: Vec<Option<u32>> = Vec::new();
    loop {
        match tag {
            PropertyTag::Known(PropertyID::End) => break,
            PropertyTag::Known(PropertyID::CRC) => {
                let num_unknown: usize = (0..num_folders)
                    .filter(|&i| !inherits_folder_digest(i))
                    .map(|i| num_unpack_streams[i])
                    .sum();
                let (input, raw) =
                    context("substreams_info crcs", |x| hash_digests(x, num_unknown))(input_mut)?;
                input_mut = input;

                digests.clear();
                let mut next_raw = 0;
                for folder_index in 0..num_folders {
                    if inherits_folder_digest(folder_index) {
                        digests.push(coders.folder_digests[folder_index]);
                    } else {
                        for _ in 0..num_unpack_streams[folder_index] {
                            digests.push(raw[next_raw]);
                            next_raw += 1;
                        }
                    }
                }
            }
            _ => {
                let (input, _) = context("substreams_info skip", skip_property_data)(input_mut)?;
                input_mut = input;
            }
        }
        let (input, next_tag) = context("substreams_info id", property_tag)(input_mut)?;
        input_mut = input;
        tag = next_tag;
    }

    if digests.is_empty() {
        for folder_index in 0..num_folders {
            if inherits_folder_digest(folder_index) {
                digests.push(coders.folder_digests[folder_index]);
            } else {
                for _ in 0..num_unpack_streams[folder_index] {
                    digests.push(None);
                }
            }
        }
    }

    return Ok((
        input_mut,
        SubStreamsInfo {
            num_unpack_streams,
            sizes,
            digests,
        },
    ));
}

/// Reads a whole StreamsInfo structure: optional PackInfo, UnpackInfo and
/// SubStreamsInfo blocks in any combination, terminated by kEnd.
pub fn streams_info(input: &[u8]) -> SevenZResult<StreamsInfo> {
    let mut pack_info_data: Option<PackInfo> = None;
    let mut coders_info_data: Option<CodersInfo> = None;
    let mut substreams_info_data: Option<SubStreamsInfo> = None;

    let mut input_mut = input;
    loop {
        let (input, id) = context("streams_info id", property_id)(input_mut)?;
        input_mut = input;
        match id {
            PropertyID::End => break,
            PropertyID::PackInfo => {
                let (input, p) = context("streams_info pack_info", pack_info)(input_mut)?;
                pack_info_data = Some(p);
                input_mut = input;
            }
            PropertyID::UnPackInfo => {
                let (input, c) = context("streams_info coders_info", coders_info)(input_mut)?;
                coders_info_data = Some(c);
                input_mut = input;
            }
            PropertyID::SubStreamsInfo => {
                let ci = match &coders_info_data {
                    Some(ci) => ci,
                    None => {
                        return Err(nom::Err::Failure(SevenZParserError::new(
                            SevenZParserErrorKind::UnexpectedPropertyID(id as u8),
                        )))
                    }
                };
                let (input, s) = context("streams_info substreams_info", |x| {
                    substreams_info(x, ci)
                })(input_mut)?;
                substreams_info_data = Some(s);
                input_mut = input;
            }
            other => {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::UnexpectedPropertyID(other as u8),
                )))
            }
        }
    }

    // An omitted SubStreamsInfo means one sub-stream per folder.
    if substreams_info_data.is_none() {
        if let Some(ci) = &coders_info_data {
            substreams_info_data = Some(SubStreamsInfo::defaults_for(ci));
        }
    }

    return Ok((
        input_mut,
        StreamsInfo {
            pack_info: pack_info_data,
            coders_info: coders_info_data,
            substreams_info: substreams_info_data,
        },
    ));
}
