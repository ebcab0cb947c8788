//! This module contains decoders for the stream formats documented in
//! 7zip's methods.txt that this crate supports.

mod bcj;
mod bcj2;
mod copy;
mod lzma;
mod lzma2;
pub use bcj::*;
pub use bcj2::*;
pub use copy::*;
pub use lzma::*;
pub use lzma2::*;

use crate::parser::types::Coder;

/// Method identifiers this crate knows about.
///
/// An unknown ID makes the containing folder unsupported; it does not make
/// the whole archive unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodId {
    Copy,
    Lzma,
    Lzma2,
    BcjX86,
    BcjArm,
    Bcj2,
}

impl MethodId {
    /// Parse a method ID. It may be 1 to 8 bytes long, big-endian.
    pub fn from_bytes(id: &[u8]) -> Option<MethodId> {
        return match id {
            [0x00] => Some(MethodId::Copy),
            [0x03, 0x01, 0x01] => Some(MethodId::Lzma),
            [0x21] => Some(MethodId::Lzma2),
            [0x03, 0x03, 0x01, 0x03] => Some(MethodId::BcjX86),
            [0x03, 0x03, 0x05, 0x01] => Some(MethodId::BcjArm),
            [0x03, 0x03, 0x01, 0x1B] => Some(MethodId::Bcj2),
            _ => None,
        };
    }

    /// Main codecs consume a pack stream and produce a buffer on their own.
    pub fn is_main(&self) -> bool {
        return matches!(self, MethodId::Copy | MethodId::Lzma | MethodId::Lzma2);
    }

    /// In-place branch converters applied over an already decoded buffer.
    pub fn is_branch_filter(&self) -> bool {
        return matches!(self, MethodId::BcjX86 | MethodId::BcjArm);
    }
}

/// The top-level codec error type.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The archive contained a codec ID we can't decode.
    UnsupportedCodecID(Vec<u8>),
    /// The coder's properties blob doesn't fit the codec.
    InvalidProperties,
    /// The compressed stream is internally inconsistent.
    Corrupt(&'static str),
    /// The compressed stream ended before the declared output was produced.
    Truncated,
    /// A stored stream whose length doesn't match the declared output size.
    SizeMismatch { expected: usize, got: usize },
}

/// The main interface trait for other code to use.
///
/// All main codecs must implement it. Decoding happens into a caller-sized
/// output buffer, because 7z folders always declare their unpacked size.
pub trait Codec {
    /// Decode `input` into `out`, filling it completely.
    fn decode(&self, input: &[u8], out: &mut [u8]) -> Result<(), CodecError>;
}

/// All currently supported main codecs.
pub enum Codecs {
    /// As the name implies, simply copies the data byte-for-byte.
    Copy(Copy),
    Lzma(Lzma),
    Lzma2(Lzma2),
}

impl Codecs {
    /// Builds the decoder for a coder declaration, parsing its properties.
    pub fn for_coder(coder: &Coder) -> Result<Codecs, CodecError> {
        let attrs = coder.attrs.as_deref();
        return match MethodId::from_bytes(&coder.id) {
            Some(MethodId::Copy) => Ok(Codecs::Copy(Copy::new())),
            Some(MethodId::Lzma) => Ok(Codecs::Lzma(Lzma::with_attrs(attrs)?)),
            Some(MethodId::Lzma2) => Ok(Codecs::Lzma2(Lzma2::with_attrs(attrs)?)),
            _ => Err(CodecError::UnsupportedCodecID(coder.id.clone())),
        };
    }
}

impl Codec for Codecs {
    fn decode(&self, input: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        return match self {
            Codecs::Copy(c) => c.decode(input, out),
            Codecs::Lzma(c) => c.decode(input, out),
            Codecs::Lzma2(c) => c.decode(input, out),
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_id_lookup() {
        assert_eq!(MethodId::from_bytes(&[0x00]), Some(MethodId::Copy));
        assert_eq!(MethodId::from_bytes(&[0x03, 0x01, 0x01]), Some(MethodId::Lzma));
        assert_eq!(MethodId::from_bytes(&[0x21]), Some(MethodId::Lzma2));
        assert_eq!(
            MethodId::from_bytes(&[0x03, 0x03, 0x01, 0x03]),
            Some(MethodId::BcjX86)
        );
        assert_eq!(
            MethodId::from_bytes(&[0x03, 0x03, 0x05, 0x01]),
            Some(MethodId::BcjArm)
        );
        assert_eq!(
            MethodId::from_bytes(&[0x03, 0x03, 0x01, 0x1B]),
            Some(MethodId::Bcj2)
        );
        // AES-256, deliberately not supported.
        assert_eq!(MethodId::from_bytes(&[0x06, 0xF1, 0x07, 0x01]), None);
        assert_eq!(MethodId::from_bytes(&[]), None);
    }

    #[test]
    fn method_id_classes() {
        assert!(MethodId::Copy.is_main());
        assert!(MethodId::Lzma.is_main());
        assert!(MethodId::Lzma2.is_main());
        assert!(!MethodId::Bcj2.is_main());
        assert!(MethodId::BcjX86.is_branch_filter());
        assert!(MethodId::BcjArm.is_branch_filter());
        assert!(!MethodId::Bcj2.is_branch_filter());
    }
}
