use super::*;
use crate::parser::err::*;
use crate::parser::types::*;

use bitvec::prelude::*;
use nom::bytes::complete::{tag, take};
use nom::error::context;
use nom::multi::{count, many_till};
use nom::number::complete::{le_u16, le_u32, le_u64};
use widestring::U16Str;

/// Hard ceiling on the declared file count, to keep a corrupt count from
/// driving the table allocations.
const NUM_FILES_MAX: usize = 1 << 28;

/// Parse a null-terminated string made of Windows-style UTF-16LE codepoints.
fn wchar_str(input: &[u8]) -> SevenZResult<String> {
    let (input, (data, _)) = context("wchar_str data", many_till(le_u16, tag([0, 0])))(input)?;
    let win_str = U16Str::from_slice(&data);
    let res = match win_str.to_string() {
        Ok(s) => s,
        Err(_) => {
            return Err(nom::Err::Failure(SevenZParserError::new(
                SevenZParserErrorKind::NameNotUtf16,
            )))
        }
    };
    return Ok((input, res));
}

/// The kName payload: external flag, then all names back-to-back.
fn names(input: &[u8], num_files: usize) -> SevenZResult<Vec<String>> {
    let (input, external) = context("names external", bool_byte)(input)?;
    if external {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("externally stored file names"),
        )));
    }
    // UTF-16 data must pair up.
    if input.len() % 2 != 0 {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::OddNameLength(input.len()),
        )));
    }
    let (input, names) = context("names names", count(wchar_str, num_files))(input)?;
    return Ok((input, names));
}

/// An optional-value property: defined bitmap, external flag, then one value
/// per defined file.
fn optional_values<'a, T: Copy>(
    input: &'a [u8],
    num_files: usize,
    mut value: impl FnMut(&'a [u8]) -> SevenZResult<'a, T>,
) -> SevenZResult<'a, Vec<Option<T>>> {
    let (input, defined) = context("optional_values defined", |x| {
        take_bitvec_or_all_set(x, num_files)
    })(input)?;
    let (input, external) = context("optional_values external", bool_byte)(input)?;
    if external {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("externally stored file properties"),
        )));
    }

    let mut input_mut = input;
    let mut values: Vec<Option<T>> = Vec::with_capacity(num_files);
    for i in 0..num_files {
        if defined[i] {
            let (input, v) = value(input_mut)?;
            input_mut = input;
            values.push(Some(v));
        } else {
            values.push(None);
        }
    }
    return Ok((input_mut, values));
}

/// Parses the FilesInfo block (the property ID itself is consumed by the
/// caller) into a fully resolved file table.
///
/// Every property is length-prefixed; unknown ones are skipped wholesale.
/// A property claiming more bytes than remain in the header is corrupt.
pub fn files_info(input: &[u8]) -> SevenZResult<FilesInfo> {
    let (input, num_files) = context("files_info num_files", sevenz_uint64_as_u32)(input)?;
    let num_files = num_files as usize;
    if num_files > NUM_FILES_MAX {
        return Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::Unsupported("too many files"),
        )));
    }

    let mut info = FilesInfo {
        num_files,
        empty_streams: BitVec::repeat(false, num_files),
        empty_files: BitVec::new(),
        antis: BitVec::new(),
        names: Vec::new(),
        attributes: vec![None; num_files],
        mtimes: vec![None; num_files],
    };

    let mut input_mut = input;
    loop {
        let (input, tag) = context("files_info id", property_tag)(input_mut)?;
        input_mut = input;
        if tag == PropertyTag::Known(PropertyID::End) {
            break;
        }
        let (input, size) = context("files_info property size", sevenz_uint64_as_usize)(input_mut)?;
        let (input, body) = context("files_info property body", take(size))(input)?;
        input_mut = input;

        match tag {
            PropertyTag::Known(PropertyID::EmptyStream) => {
                let (_, bits) = context("files_info empty_stream", |x| {
                    take_bitvec(x, num_files)
                })(body)?;
                info.empty_streams = bits;
            }
            PropertyTag::Known(PropertyID::EmptyFile) => {
                let (_, bits) = context("files_info empty_file", |x| {
                    take_bitvec(x, info.num_empty_streams())
                })(body)?;
                info.empty_files = bits;
            }
            PropertyTag::Known(PropertyID::Anti) => {
                let (_, bits) = context("files_info anti", |x| {
                    take_bitvec(x, info.num_empty_streams())
                })(body)?;
                info.antis = bits;
            }
            PropertyTag::Known(PropertyID::Name) => {
                let (_, parsed) = context("files_info names", |x| names(x, num_files))(body)?;
                info.names = parsed;
            }
            PropertyTag::Known(PropertyID::WinAttributes) => {
                let (_, attrs) = context("files_info attributes", |x| {
                    optional_values(x, num_files, le_u32)
                })(body)?;
                info.attributes = attrs;
            }
            PropertyTag::Known(PropertyID::MTime) => {
                let (_, mtimes) = context("files_info mtimes", |x| {
                    optional_values(x, num_files, le_u64)
                })(body)?;
                info.mtimes = mtimes;
            }
            // CTime, ATime, StartPos, Comment, the alignment Dummy and tags
            // outside the known set carry nothing we surface. Their payloads
            // were already consumed.
            _ => {}
        }
    }

    // Absent bit vectors mean "no bits set"; size them to the subset they cover.
    let num_empty = info.num_empty_streams();
    if info.empty_files.len() != num_empty {
        info.empty_files.resize(num_empty, false);
    }
    if info.antis.len() != num_empty {
        info.antis.resize(num_empty, false);
    }

    return Ok((input_mut, info));
}
