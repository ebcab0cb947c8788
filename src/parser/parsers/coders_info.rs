use super::*;
use crate::parser::err::*;
use crate::parser::types::*;

use nom::bytes::complete::take;
use nom::combinator::cond;
use nom::error::context;
use nom::multi::{count, length_count};
use nom::number::complete::u8;

/// One method record of a coder declaration. Returns the main byte so the
/// caller can detect the (never used in practice) alternative-method chain.
fn method_record(input: &[u8]) -> SevenZResult<(u8, Coder)> {
    fn is_complex(main_byte: u8) -> bool {
        (main_byte & 0b0001_0000) > 0
    }
    fn has_attrs(main_byte: u8) -> bool {
        (main_byte & 0b0010_0000) > 0
    }
    fn id_len(main_byte: u8) -> usize {
        (main_byte & 0b0000_1111) as usize
    }

    let (input, main_byte) = context("coder main byte", u8)(input)?;
    if id_len(main_byte) > 8 {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("method ID longer than 8 bytes"),
        )));
    }
    let (input, id) = context("coder ID", take(id_len(main_byte)))(input)?;
    let id = Vec::from(id);

    let (input, complex) = cond(
        is_complex(main_byte),
        context("coder number of complex streams", |x| {
            let (x, num_in_streams) = sevenz_uint64(x)?;
            let (x, num_out_streams) = sevenz_uint64(x)?;
            if num_in_streams > NUM_CODER_STREAMS_MAX || num_out_streams > NUM_CODER_STREAMS_MAX {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::Unsupported("too many streams for one coder"),
                )));
            }
            return Ok((
                x,
                CoderComplex {
                    num_in_streams,
                    num_out_streams,
                },
            ));
        }),
    )(input)?;

    let (input, attrs) = context(
        "coder attributes",
        cond(
            has_attrs(main_byte),
            length_count(sevenz_uint64_as_usize, u8),
        ),
    )(input)?;

    return Ok((input, (main_byte, Coder { complex, attrs, id })));
}

pub fn coder(input: &[u8]) -> SevenZResult<Coder> {
    let (input, (main_byte, coder)) = method_record(input)?;

    // Alternative methods are declared in the format but no encoder ever
    // writes them. Consume the chained records so the cursor stays in sync,
    // keep only the primary one.
    let mut input_mut = input;
    let mut chain_byte = main_byte;
    while (chain_byte & 0b1000_0000) > 0 {
        let (input, (next_byte, _alternative)) =
            context("coder alternative method", method_record)(input_mut)?;
        input_mut = input;
        chain_byte = next_byte;
    }

    return Ok((input_mut, coder));
}

pub fn folder(input: &[u8]) -> SevenZResult<Folder> {
    let (input, num_coders) = context("folder num_coders", sevenz_uint64_as_u32)(input)?;
    let num_coders = num_coders as usize;
    if num_coders == 0 {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Nom(input, nom::error::ErrorKind::Verify),
        )));
    }
    if num_coders > NUM_FOLDER_CODERS_MAX {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("too many coders in one folder"),
        )));
    }
    let (input, coders_vec) = context("folder coders", count(coder, num_coders))(input)?;

    let num_out_streams_total: u64 = coders_vec.iter().map(|c| c.num_out_streams()).sum();
    let num_out_streams_total: usize = to_usize_or_err!(num_out_streams_total);
    if num_out_streams_total == 0 {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("folder without output streams"),
        )));
    }

    // Format invariant: a folder's graph is a tree merged into one sink.
    let num_bind_pairs = num_out_streams_total - 1;
    let (input, bind_pairs) = context(
        "folder bind_pairs",
        count(
            |x| {
                let (x, in_index) = sevenz_uint64(x)?;
                let (x, out_index) = sevenz_uint64(x)?;
                return Ok((x, BindPair { in_index, out_index }));
            },
            num_bind_pairs,
        ),
    )(input)?;

    let num_in_streams_total: u64 = coders_vec.iter().map(|c| c.num_in_streams()).sum();
    let num_in_streams_total: usize = to_usize_or_err!(num_in_streams_total);
    if num_bind_pairs > num_in_streams_total {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Nom(input, nom::error::ErrorKind::Verify),
        )));
    }
    let num_packed_streams = num_in_streams_total - num_bind_pairs;

    let folder_so_far = Folder {
        coders: coders_vec,
        bind_pairs,
        packed_streams_indices: Vec::new(),
        unpack_sizes: Vec::new(),
    };

    // A single pack stream is implicit: the one input no bind-pair targets.
    let (input, packed_streams_indices) = if num_packed_streams == 1 {
        let mut unbound = None;
        for in_index in 0..(num_in_streams_total as u64) {
            if folder_so_far.find_bind_pair_for_in_stream(in_index).is_none() {
                if unbound.is_some() {
                    return Err(nom::Err::Failure(SevenZParserError::new(
                        SevenZParserErrorKind::Nom(input, nom::error::ErrorKind::Verify),
                    )));
                }
                unbound = Some(in_index);
            }
        }
        match unbound {
            Some(idx) => (input, vec![idx]),
            None => {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::Nom(input, nom::error::ErrorKind::Verify),
                )))
            }
        }
    } else {
        context(
            "folder packed_streams_indices",
            count(sevenz_uint64, num_packed_streams),
        )(input)?
    };

    return Ok((
        input,
        Folder {
            packed_streams_indices,
            ..folder_so_far
        },
    ));
}

/// Parses the UnpackInfo block (the property ID itself is consumed by the
/// caller): folder graphs, per-output unpack sizes and optional folder CRCs.
pub fn coders_info(input: &[u8]) -> SevenZResult<CodersInfo> {
    let (input, _) = context("coders_info PropertyID::Folder", |x| {
        tag_property_id(x, PropertyID::Folder)
    })(input)?;

    let (input, num_folders) = context("coders_info num_folders", sevenz_uint64_as_u32)(input)?;
    let num_folders = num_folders as usize;
    check_count(input, num_folders)?;

    let (input, external) = context("coders_info external", bool_byte)(input)?;
    if external {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("externally stored folder descriptions"),
        )));
    }

    let (input, mut folders) = context("coders_info folders", count(folder, num_folders))(input)?;

    let (input, _) = context("coders_info wait for kCodersUnpackSize", |x| {
        wait_for_property_id(x, PropertyID::CodersUnPackSize)
    })(input)?;

    // One unpacked size per declared output stream, folder by folder.
    let mut input_mut = input;
    for folder in &mut folders {
        let num_out_streams = to_usize_or_err!(folder.num_out_streams_total());
        let mut unpack_sizes = Vec::with_capacity(num_out_streams);
        for _ in 0..num_out_streams {
            let (input, size) = context("coders_info unpack size", sevenz_uint64)(input_mut)?;
            input_mut = input;
            unpack_sizes.push(size);
        }
        folder.unpack_sizes = unpack_sizes;
    }

    let mut folder_digests: Vec<Option<u32>> = vec![None; num_folders];
    loop {
        let (input, tag) = context("coders_info id", property_tag)(input_mut)?;
        input_mut = input;
        match tag {
            PropertyTag::Known(PropertyID::End) => break,
            PropertyTag::Known(PropertyID::CRC) => {
                let (input, digests) =
                    context("coders_info unpack_digests", |x| hash_digests(x, num_folders))(input_mut)?;
                folder_digests = digests;
                input_mut = input;
            }
            _ => {
                let (input, _) = context("coders_info skip", skip_property_data)(input_mut)?;
                input_mut = input;
            }
        }
    }

    // Every folder must resolve to exactly one unbound output.
    for folder in &folders {
        if folder.unbound_output_stream().is_none() {
            return Err(nom::Err::Failure(SevenZParserError::new(
                SevenZParserErrorKind::Nom(input_mut, nom::error::ErrorKind::Verify),
            )));
        }
    }

    return Ok((
        input_mut,
        CodersInfo {
            folders,
            folder_digests,
        },
    ));
}
