use super::{Codec, CodecError};

/// The trivial codec.
/// Simply shuffles bytes it gets back out.
pub struct Copy {}

impl Copy {
    /// Creates a new `Copy` codec.
    /// Because this codec doesn't really need construction, this ctor is only implemented for the sake of uniformity.
    pub fn new() -> Copy {
        return Copy {};
    }
}

impl Codec for Copy {
    fn decode(&self, input: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        // A stored stream must match the declared unpacked size exactly.
        if input.len() != out.len() {
            return Err(CodecError::SizeMismatch {
                expected: out.len(),
                got: input.len(),
            });
        }
        out.copy_from_slice(input);
        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn copy_roundtrip() {
        let input = b"stored, not compressed";
        let mut out = vec![0u8; input.len()];
        Copy::new().decode(input, &mut out).unwrap();
        assert_eq!(&out, input);
    }

    #[test]
    fn copy_rejects_size_mismatch() {
        let mut out = vec![0u8; 4];
        let res = Copy::new().decode(b"12345", &mut out);
        assert_eq!(
            res,
            Err(CodecError::SizeMismatch {
                expected: 4,
                got: 5
            })
        );
    }
}
