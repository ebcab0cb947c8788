/// Folders may not declare more coders than this.
pub const NUM_FOLDER_CODERS_MAX: usize = 32;
/// A single coder may not declare more input or output streams than this.
pub const NUM_CODER_STREAMS_MAX: u64 = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoderComplex {
    pub num_in_streams: u64,
    pub num_out_streams: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coder {
    pub complex: Option<CoderComplex>,
    pub attrs: Option<Vec<u8>>,
    pub id: Vec<u8>,
}

impl Coder {
    pub fn num_in_streams(&self) -> u64 {
        return match self.complex {
            Some(c) => c.num_in_streams,
            None => 1,
        };
    }

    pub fn num_out_streams(&self) -> u64 {
        return match self.complex {
            Some(c) => c.num_out_streams,
            None => 1,
        };
    }
}

/// An edge stitching one coder's output stream into another coder's input
/// stream, in the folder-global stream numbering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindPair {
    pub in_index: u64,
    pub out_index: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub coders: Vec<Coder>,
    pub bind_pairs: Vec<BindPair>,
    /// Global input stream indices fed directly from the pack data region.
    pub packed_streams_indices: Vec<u64>,
    /// Declared unpacked size of every coder output stream, in global order.
    /// Filled in by the CodersUnpackSize block that follows the folder list.
    pub unpack_sizes: Vec<u64>,
}

impl Folder {
    pub fn num_out_streams_total(&self) -> u64 {
        return self.coders.iter().map(|c| c.num_out_streams()).sum();
    }

    pub fn find_bind_pair_for_in_stream(&self, in_index: u64) -> Option<usize> {
        return self.bind_pairs.iter().position(|b| b.in_index == in_index);
    }

    pub fn find_bind_pair_for_out_stream(&self, out_index: u64) -> Option<usize> {
        return self.bind_pairs.iter().position(|b| b.out_index == out_index);
    }

    /// The global index of the folder's sole unbound output stream.
    ///
    /// Every valid folder has exactly one output no bind-pair sources from;
    /// its declared size is the folder's unpacked size.
    pub fn unbound_output_stream(&self) -> Option<u64> {
        let total = self.num_out_streams_total();
        let mut found = None;
        for out in 0..total {
            if self.find_bind_pair_for_out_stream(out).is_none() {
                if found.is_some() {
                    return None;
                }
                found = Some(out);
            }
        }
        return found;
    }

    /// Total unpacked size of the folder (size of the unbound output).
    pub fn unpack_size(&self) -> u64 {
        return match self.unbound_output_stream() {
            Some(out) => self.unpack_sizes.get(out as usize).copied().unwrap_or(0),
            None => 0,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodersInfo {
    pub folders: Vec<Folder>,
    /// Declared CRC of each folder's unpacked output, where known.
    pub folder_digests: Vec<Option<u32>>,
}
