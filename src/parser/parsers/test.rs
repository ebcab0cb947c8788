use super::*;
use crate::parser::crc::sevenz_crc;

use bitvec::prelude::*;

#[test]
fn test_sevenz_uint64() {
    // (encoded bytes, decoded value)
    let cases: &[(&[u8], u64)] = &[
        (&[0x00], 0),
        (&[0x7F], 0x7F),
        (&[0x80, 0x80], 0x80),
        (&[0x80, 0xFF], 0xFF),
        (&[0xBF, 0xFF], 0x3FFF),
        (&[0xC0, 0x00, 0x40], 0x4000),
        (
            &[0xFF, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
            0x0807_0605_0403_0201,
        ),
        (
            &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            u64::MAX,
        ),
    ];
    for (encoded, expected) in cases {
        let (rest, val) = sevenz_uint64(encoded).unwrap();
        assert_eq!(val, *expected, "input {:02X?}", encoded);
        assert!(rest.is_empty());
    }
}

#[test]
fn test_sevenz_uint64_trailing_input() {
    let (rest, val) = sevenz_uint64(&[0x7F, 0xAA, 0xBB]).unwrap();
    assert_eq!(val, 0x7F);
    assert_eq!(rest, &[0xAA, 0xBB]);
}

#[test]
fn test_sevenz_uint64_as_u32_guards_counts() {
    let (_, val) = sevenz_uint64_as_u32(&[0xBF, 0xFF]).unwrap();
    assert_eq!(val, 0x3FFF);

    // 0x8000_0000 is the first value rejected.
    let res = sevenz_uint64_as_u32(&[0xF0, 0x00, 0x00, 0x00, 0x80]);
    assert!(matches!(
        res,
        Err(nom::Err::Error(SevenZParserError {
            kind: SevenZParserErrorKind::NumberTooLarge(0x8000_0000),
            ..
        }))
    ));
}

#[test]
fn test_bool_byte() {
    assert_eq!(bool_byte(&[0x00]).unwrap().1, false);
    assert_eq!(bool_byte(&[0x01]).unwrap().1, true);
    assert!(matches!(
        bool_byte(&[0x02]),
        Err(nom::Err::Error(SevenZParserError {
            kind: SevenZParserErrorKind::InvalidBooleanByte(0x02),
            ..
        }))
    ));
}

#[test]
fn test_take_bitvec() {
    let (rest, bits) = take_bitvec(&[0b1010_0000, 0xFF], 3).unwrap();
    assert_eq!(bits, bitvec![1, 0, 1]);
    assert_eq!(rest, &[0xFF]);

    // Bits spanning two bytes, MSB first.
    let (rest, bits) = take_bitvec(&[0b0000_0001, 0b1000_0000], 9).unwrap();
    assert_eq!(bits, bitvec![0, 0, 0, 0, 0, 0, 0, 1, 1]);
    assert!(rest.is_empty());
}

#[test]
fn test_take_bitvec_or_all_set() {
    // Leading 0x01 means "all defined", no bitmap follows.
    let (rest, bits) = take_bitvec_or_all_set(&[0x01, 0xAA], 4).unwrap();
    assert_eq!(bits, bitvec![1, 1, 1, 1]);
    assert_eq!(rest, &[0xAA]);

    let (rest, bits) = take_bitvec_or_all_set(&[0x00, 0b0110_0000], 4).unwrap();
    assert_eq!(bits, bitvec![0, 1, 1, 0]);
    assert!(rest.is_empty());
}

#[test]
fn test_hash_digests() {
    // Two items: the first defined with CRC 0x04030201, the second not.
    let input = [0x00, 0b1000_0000, 0x01, 0x02, 0x03, 0x04];
    let (rest, digests) = hash_digests(&input, 2).unwrap();
    assert_eq!(digests, vec![Some(0x0403_0201), None]);
    assert!(rest.is_empty());
}

/// Builds a valid 32-byte signature header around the given start header.
fn build_signature_header(offset: u64, size: u64, crc: u32) -> Vec<u8> {
    let mut start_header = Vec::new();
    start_header.extend_from_slice(&offset.to_le_bytes());
    start_header.extend_from_slice(&size.to_le_bytes());
    start_header.extend_from_slice(&crc.to_le_bytes());

    let mut raw = Vec::new();
    raw.extend_from_slice(&MAGIC);
    raw.extend_from_slice(&[0x00, 0x04]);
    raw.extend_from_slice(&sevenz_crc(&start_header).to_le_bytes());
    raw.extend_from_slice(&start_header);
    return raw;
}

#[test]
fn test_signature_header() {
    let raw = build_signature_header(0x20, 0x5A, 0xDEAD_BEEF);
    let (_, sig) = signature_header(&raw).unwrap();
    assert_eq!(sig.archive_version.major, 0);
    assert_eq!(sig.archive_version.minor, 4);
    assert_eq!(sig.start_header.next_header_offset, 0x20);
    assert_eq!(sig.start_header.next_header_size, 0x5A);
    assert_eq!(sig.start_header.next_header_crc, 0xDEAD_BEEF);
}

#[test]
fn test_signature_header_bad_magic() {
    let mut raw = build_signature_header(0, 0, 0);
    raw[0] = b'8';
    assert!(matches!(
        signature_header(&raw),
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::BadSignature(_),
            ..
        }))
    ));
}

#[test]
fn test_signature_header_unsupported_version() {
    let mut raw = build_signature_header(0, 0, 0);
    raw[6] = 0x01;
    assert!(matches!(
        signature_header(&raw),
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::UnsupportedVersion { major: 1, minor: 4 },
            ..
        }))
    ));
}

#[test]
fn test_signature_header_crc_mismatch() {
    let mut raw = build_signature_header(0x20, 0x5A, 0);
    // Corrupt one start header byte after the CRC was computed.
    raw[12] ^= 0xFF;
    assert!(matches!(
        signature_header(&raw),
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::Crc(_, _),
            ..
        }))
    ));
}

#[test]
fn test_folder_single_copy_coder() {
    // One coder: main byte 0x01 (simple, 1-byte ID), ID 0x00 (Copy).
    let input = [0x01, 0x01, 0x00];
    let (rest, folder) = folder(&input).unwrap();
    assert!(rest.is_empty());
    assert_eq!(folder.coders.len(), 1);
    assert_eq!(folder.coders[0].id, vec![0x00]);
    assert_eq!(folder.coders[0].num_in_streams(), 1);
    assert_eq!(folder.coders[0].num_out_streams(), 1);
    assert!(folder.bind_pairs.is_empty());
    // The single pack stream is implicit: the one unbound input.
    assert_eq!(folder.packed_streams_indices, vec![0]);
}

#[test]
fn test_folder_lzma_coder_with_attrs() {
    // Main byte 0x23: 3-byte ID, attributes present. LZMA's 5-byte blob.
    let input = [
        0x01, 0x23, 0x03, 0x01, 0x01, 0x05, 0x5D, 0x00, 0x00, 0x01, 0x00,
    ];
    let (_, folder) = folder(&input).unwrap();
    assert_eq!(folder.coders[0].id, vec![0x03, 0x01, 0x01]);
    assert_eq!(
        folder.coders[0].attrs,
        Some(vec![0x5D, 0x00, 0x00, 0x01, 0x00])
    );
}

#[test]
fn test_folder_two_coders_with_bind_pair() {
    // Coder 0: Copy. Coder 1: BCJ x86 (4-byte ID). One bind pair (in 1, out 0).
    let input = [
        0x02, // num_coders
        0x01, 0x00, // Copy
        0x04, 0x03, 0x03, 0x01, 0x03, // BCJ x86
        0x01, 0x00, // bind pair
    ];
    let (rest, folder) = folder(&input).unwrap();
    assert!(rest.is_empty());
    assert_eq!(folder.coders.len(), 2);
    assert_eq!(
        folder.bind_pairs,
        vec![BindPair {
            in_index: 1,
            out_index: 0
        }]
    );
    assert_eq!(folder.packed_streams_indices, vec![0]);
}

#[test]
fn test_folder_rejects_oversized_method_id() {
    let input = [0x09, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    let res = coder(&input);
    assert!(matches!(
        res,
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::Unsupported(_),
            ..
        }))
    ));
}

/// A minimal UnpackInfo payload: one folder, one Copy coder, size 5.
fn unpack_info_copy(unpack_size: u8) -> Vec<u8> {
    return vec![
        PropertyID::Folder as u8,
        0x01, // num_folders
        0x00, // not external
        0x01, // num_coders
        0x01,
        0x00, // Copy coder
        PropertyID::CodersUnPackSize as u8,
        unpack_size,
        PropertyID::End as u8,
    ];
}

#[test]
fn test_coders_info() {
    let input = unpack_info_copy(5);
    let (rest, ci) = coders_info(&input).unwrap();
    assert!(rest.is_empty());
    assert_eq!(ci.folders.len(), 1);
    assert_eq!(ci.folders[0].unpack_sizes, vec![5]);
    assert_eq!(ci.folders[0].unpack_size(), 5);
    assert_eq!(ci.folder_digests, vec![None]);
}

#[test]
fn test_coders_info_with_crc() {
    let mut input = unpack_info_copy(5);
    // Splice a CRC block in before the end marker.
    input.pop();
    input.extend_from_slice(&[PropertyID::CRC as u8, 0x01, 0x11, 0x22, 0x33, 0x44]);
    input.push(PropertyID::End as u8);

    let (_, ci) = coders_info(&input).unwrap();
    assert_eq!(ci.folder_digests, vec![Some(0x4433_2211)]);
}

#[test]
fn test_streams_info_with_defaults() {
    // PackInfo: pack_pos 0, one stream of 5 bytes. UnpackInfo: one Copy
    // folder of 5 bytes. No SubStreamsInfo, so the defaults kick in.
    let mut input = vec![
        PropertyID::PackInfo as u8,
        0x00, // pack_pos
        0x01, // num streams
        PropertyID::Size as u8,
        0x05,
        PropertyID::End as u8,
        PropertyID::UnPackInfo as u8,
    ];
    input.extend_from_slice(&unpack_info_copy(5));
    input.push(PropertyID::End as u8);

    let (rest, si) = streams_info(&input).unwrap();
    assert!(rest.is_empty());

    let pack = si.pack_info.unwrap();
    assert_eq!(pack.pack_pos, 0);
    assert_eq!(pack.sizes, vec![5]);
    assert!(pack.crcs.is_empty());

    let subs = si.substreams_info.unwrap();
    assert_eq!(subs.num_unpack_streams, vec![1]);
    assert_eq!(subs.sizes, vec![5]);
    assert_eq!(subs.digests, vec![None]);
}

#[test]
fn test_substreams_info_derives_last_size() {
    let (_, ci) = coders_info(&unpack_info_copy(10)).unwrap();
    // Two sub-streams in the folder: 3 explicit, the rest (7) derived.
    let input = [
        PropertyID::NumUnPackStream as u8,
        0x02,
        PropertyID::Size as u8,
        0x03,
        PropertyID::End as u8,
    ];
    let (_, subs) = substreams_info(&input, &ci).unwrap();
    assert_eq!(subs.num_unpack_streams, vec![2]);
    assert_eq!(subs.sizes, vec![3, 7]);
    assert_eq!(subs.digests, vec![None, None]);
}

#[test]
fn test_substreams_info_rejects_oversized_parts() {
    let (_, ci) = coders_info(&unpack_info_copy(10)).unwrap();
    let input = [
        PropertyID::NumUnPackStream as u8,
        0x02,
        PropertyID::Size as u8,
        0x0B, // 11 > folder size 10
        PropertyID::End as u8,
    ];
    assert!(matches!(
        substreams_info(&input, &ci),
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::SubstreamSizeMismatch,
            ..
        }))
    ));
}

#[test]
fn test_substreams_info_skips_unrecognized_tags() {
    let (_, ci) = coders_info(&unpack_info_copy(5)).unwrap();
    // A tag outside the known set, correctly length-prefixed.
    let input = [
        0x1A,
        0x02,
        0xAA,
        0xBB,
        PropertyID::End as u8,
    ];
    let (_, subs) = substreams_info(&input, &ci).unwrap();
    assert_eq!(subs.sizes, vec![5]);
    assert_eq!(subs.digests, vec![None]);
}

#[test]
fn test_substreams_info_inherits_folder_digest() {
    let mut unpack = unpack_info_copy(5);
    unpack.pop();
    unpack.extend_from_slice(&[PropertyID::CRC as u8, 0x01, 0xEF, 0xBE, 0xAD, 0xDE]);
    unpack.push(PropertyID::End as u8);
    let (_, ci) = coders_info(&unpack).unwrap();

    let input = [PropertyID::End as u8];
    let (_, subs) = substreams_info(&input, &ci).unwrap();
    assert_eq!(subs.digests, vec![Some(0xDEAD_BEEF)]);
}

/// A kName payload for the given names: external flag plus UTF-16LE strings.
fn name_block(names: &[&str]) -> Vec<u8> {
    let mut block = vec![0x00];
    for name in names {
        for unit in name.encode_utf16() {
            block.extend_from_slice(&unit.to_le_bytes());
        }
        block.extend_from_slice(&[0x00, 0x00]);
    }
    return block;
}

fn with_size_prefix(block: &[u8]) -> Vec<u8> {
    // All test payloads are short enough for a single-byte 7z number.
    assert!(block.len() < 0x80);
    let mut out = vec![block.len() as u8];
    out.extend_from_slice(block);
    return out;
}

#[test]
fn test_files_info_names() {
    let mut input = vec![0x02]; // num_files
    input.push(PropertyID::Name as u8);
    input.extend_from_slice(&with_size_prefix(&name_block(&["a.txt", "b.bin"])));
    input.push(PropertyID::End as u8);

    let (rest, fi) = files_info(&input).unwrap();
    assert!(rest.is_empty());
    assert_eq!(fi.num_files, 2);
    assert_eq!(fi.names, vec!["a.txt".to_string(), "b.bin".to_string()]);
    assert_eq!(fi.num_empty_streams(), 0);
}

#[test]
fn test_files_info_empty_streams_and_files() {
    // Three files; the second and third have no stream. Of those two, the
    // first is an empty file and the second a directory.
    let mut input = vec![0x03];
    input.push(PropertyID::EmptyStream as u8);
    input.extend_from_slice(&with_size_prefix(&[0b0110_0000]));
    input.push(PropertyID::EmptyFile as u8);
    input.extend_from_slice(&with_size_prefix(&[0b1000_0000]));
    input.push(PropertyID::End as u8);

    let (_, fi) = files_info(&input).unwrap();
    assert_eq!(fi.num_empty_streams(), 2);
    assert_eq!(fi.empty_streams, bitvec![0, 1, 1]);
    assert_eq!(fi.empty_files, bitvec![1, 0]);
    assert_eq!(fi.antis, bitvec![0, 0]);
}

#[test]
fn test_files_info_skips_unknown_properties() {
    let mut input = vec![0x01];
    // A Comment block we don't interpret; must be skipped by its size.
    input.push(PropertyID::Comment as u8);
    input.extend_from_slice(&with_size_prefix(&[0xAA, 0xBB, 0xCC]));
    input.push(PropertyID::Name as u8);
    input.extend_from_slice(&with_size_prefix(&name_block(&["x"])));
    input.push(PropertyID::End as u8);

    let (_, fi) = files_info(&input).unwrap();
    assert_eq!(fi.names, vec!["x".to_string()]);
}

#[test]
fn test_files_info_skips_unrecognized_tags() {
    // Tags outside the known set are still length-prefixed and must be
    // stepped over, not rejected.
    let mut input = vec![0x01];
    input.push(0x1A);
    input.extend_from_slice(&with_size_prefix(&[0xDE, 0xAD, 0xBE]));
    input.push(PropertyID::Name as u8);
    input.extend_from_slice(&with_size_prefix(&name_block(&["x"])));
    input.push(PropertyID::End as u8);

    let (_, fi) = files_info(&input).unwrap();
    assert_eq!(fi.names, vec!["x".to_string()]);
}

#[test]
fn test_files_info_rejects_odd_name_payload() {
    // The 4-byte payload splits into the external flag and three string
    // bytes, which cannot be UTF-16.
    let mut input = vec![0x01, PropertyID::Name as u8, 0x04, 0x00, b'x', 0x00, 0x00];
    input.push(PropertyID::End as u8);
    let res = files_info(&input);
    assert!(matches!(
        res,
        Err(nom::Err::Failure(SevenZParserError {
            kind: SevenZParserErrorKind::OddNameLength(3),
            ..
        }))
    ));
}

#[test]
fn test_files_info_mtimes() {
    let mut input = vec![0x02];
    input.push(PropertyID::MTime as u8);
    let mut body = vec![0x00, 0b1000_0000, 0x00]; // not-all-defined, file 0 only, internal
    body.extend_from_slice(&0x0123_4567_89AB_CDEFu64.to_le_bytes());
    input.extend_from_slice(&with_size_prefix(&body));
    input.push(PropertyID::End as u8);

    let (_, fi) = files_info(&input).unwrap();
    assert_eq!(fi.mtimes, vec![Some(0x0123_4567_89AB_CDEF), None]);
}

#[test]
fn test_header_with_files_only() {
    let mut input = vec![PropertyID::FilesInfo as u8, 0x01];
    input.push(PropertyID::Name as u8);
    input.extend_from_slice(&with_size_prefix(&name_block(&["only"])));
    input.push(PropertyID::End as u8); // end of FilesInfo
    input.push(PropertyID::End as u8); // end of Header

    let (rest, h) = header(&input).unwrap();
    assert!(rest.is_empty());
    assert!(h.main_streams.is_none());
    let files = h.files.unwrap();
    assert_eq!(files.names, vec!["only".to_string()]);
}

#[test]
fn test_next_header_dispatch() {
    let input = [PropertyID::Header as u8, PropertyID::End as u8];
    let (_, nh) = next_header(&input).unwrap();
    assert!(matches!(nh, NextHeader::Header(_)));

    let input = [PropertyID::EncodedHeader as u8, PropertyID::End as u8];
    let (_, nh) = next_header(&input).unwrap();
    assert!(matches!(nh, NextHeader::Encoded(_)));
}
