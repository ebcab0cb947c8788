use super::*;
use crate::parser::err::*;
use crate::parser::types::*;

use nom::error::context;

/// Skips the ArchiveProperties block: repeated (id, length, payload)
/// records until kEnd. Nothing in it has semantic use for extraction.
pub fn archive_properties(input: &[u8]) -> SevenZResult<()> {
    let mut input_mut = input;
    loop {
        let (input, tag) = context("archive_properties id", property_tag)(input_mut)?;
        input_mut = input;
        if tag == PropertyTag::Known(PropertyID::End) {
            return Ok((input_mut, ()));
        }
        let (input, _) = context("archive_properties skip", skip_property_data)(input_mut)?;
        input_mut = input;
    }
}

/// The body of a plain header, after the kHeader ID has been consumed.
pub fn header(input: &[u8]) -> SevenZResult<Header> {
    let mut main_streams: Option<StreamsInfo> = None;
    let mut files: Option<FilesInfo> = None;

    let mut input_mut = input;
    loop {
        let (input, id) = context("header id", property_id)(input_mut)?;
        input_mut = input;
        match id {
            PropertyID::End => break,
            PropertyID::ArchiveProperties => {
                let (input, _) =
                    context("header archive_properties", archive_properties)(input_mut)?;
                input_mut = input;
            }
            PropertyID::MainStreamsInfo => {
                let (input, si) = context("header main_streams", streams_info)(input_mut)?;
                main_streams = Some(si);
                input_mut = input;
            }
            PropertyID::FilesInfo => {
                let (input, fi) = context("header files_info", files_info)(input_mut)?;
                files = Some(fi);
                input_mut = input;
            }
            PropertyID::AdditionalStreamsInfo => {
                // Only written together with external header data,
                // which we reject.
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::Unsupported("additional streams info"),
                )));
            }
            other => {
                return Err(nom::Err::Failure(SevenZParserError::new(
                    SevenZParserErrorKind::UnexpectedPropertyID(other as u8),
                )))
            }
        }
    }

    return Ok((
        input_mut,
        Header {
            main_streams,
            files,
        },
    ));
}

/// Dispatches the trailing header block: either a plain header, or the
/// streams description of a single folder that decodes to the real header.
pub fn next_header(input: &[u8]) -> SevenZResult<NextHeader> {
    let (input, id) = context("next_header id", property_id)(input)?;
    return match id {
        PropertyID::Header => {
            let (input, h) = context("next_header header", header)(input)?;
            Ok((input, NextHeader::Header(h)))
        }
        PropertyID::EncodedHeader => {
            let (input, si) = context("next_header encoded streams_info", streams_info)(input)?;
            Ok((input, NextHeader::Encoded(si)))
        }
        other => Err(nom::Err::Failure(SevenZParserError::new(
            SevenZParserErrorKind::UnexpectedPropertyID(other as u8),
        ))),
    };
}
