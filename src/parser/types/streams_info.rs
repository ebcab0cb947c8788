use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct PackInfo {
    /// Offset of the pack data region, relative to the end of the signature header.
    pub pack_pos: u64,
    /// Size of each pack stream in the pack data region, in order.
    pub sizes: Vec<u64>,
    /// Optional per-pack-stream CRCs. Empty when the archive carries none.
    pub crcs: Vec<Option<u32>>,
}

/// Per-folder sub-stream layout, fully resolved against the folder sizes.
///
/// When the archive omits the whole block or parts of it, the defaults apply:
/// one sub-stream per folder, sized to the folder, with the folder's CRC.
#[derive(Debug, Clone, PartialEq)]
pub struct SubStreamsInfo {
    /// Number of sub-streams in each folder.
    pub num_unpack_streams: Vec<usize>,
    /// Sizes of all sub-streams, folder by folder. The last sub-stream of
    /// each folder is derived by subtraction from the folder size.
    pub sizes: Vec<u64>,
    /// CRC of each sub-stream, where known.
    pub digests: Vec<Option<u32>>,
}

impl SubStreamsInfo {
    /// The layout of an archive that carries no SubStreamsInfo block:
    /// one sub-stream per folder, sized and checksummed like the folder.
    pub fn defaults_for(coders: &CodersInfo) -> SubStreamsInfo {
        return SubStreamsInfo {
            num_unpack_streams: vec![1; coders.folders.len()],
            sizes: coders.folders.iter().map(|f| f.unpack_size()).collect(),
            digests: coders.folder_digests.clone(),
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamsInfo {
    pub pack_info: Option<PackInfo>,
    pub coders_info: Option<CodersInfo>,
    pub substreams_info: Option<SubStreamsInfo>,
}
