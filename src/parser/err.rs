use nom::error::*;

/// The types of errors that may be returned by the parser.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SevenZParserErrorKind<I> {
    Nom(I, nom::error::ErrorKind),
    /// The file does not start with the 7z magic bytes.
    BadSignature([u8; 6]),
    /// The archive format major version is newer than we understand.
    UnsupportedVersion { major: u8, minor: u8 },
    // Crc(expected, computed)
    Crc(u32, u32),
    // InvalidPropertyID(id)
    InvalidPropertyID(u8),
    /// A known property ID in a place where it is not allowed.
    UnexpectedPropertyID(u8),
    ToUsizeConversionFailure(<usize as TryFrom<u64>>::Error),
    /// A 7z number too large for the field it describes.
    NumberTooLarge(u64),
    // InvalidBooleanByte(value)
    InvalidBooleanByte(u8),
    /// A file name that is not valid UTF-16.
    NameNotUtf16,
    /// A name property whose payload is not an even number of bytes.
    OddNameLength(usize),
    /// Declared sub-stream sizes exceed the folder size they must fit in.
    SubstreamSizeMismatch,
    /// Well-formed, but uses a format option we deliberately reject.
    Unsupported(&'static str),
}

/// The error type returned by all parsers.
#[derive(Debug, Clone)]
pub struct SevenZParserError<I> {
    /// What kind of error this is
    pub kind: SevenZParserErrorKind<I>,
    /// All the context we have accumulated from previous errors.
    pub ctx: Vec<(I, &'static str)>,
}

impl<I> SevenZParserError<I> {
    /// Creates a new error.
    pub fn new(kind: SevenZParserErrorKind<I>) -> Self {
        return SevenZParserError {
            kind,
            ctx: Vec::new(),
        };
    }
}

impl<I> ParseError<I> for SevenZParserError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        return SevenZParserError::new(SevenZParserErrorKind::Nom(input, kind));
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I> ContextError<I> for SevenZParserError<I> {
    fn add_context(input: I, ctx: &'static str, mut other: Self) -> Self {
        other.ctx.push((input, ctx));
        return other;
    }
}

/// Macro for converting from u64 to usize, or returning the correct error if conversion not possible
macro_rules! to_usize_or_err {
( $( $x:expr ),+ ) => {
        {
            $(
                match usize::try_from($x) {
                    Ok(res) => res,
                    Err(e) => return Err(nom::Err::Error($crate::parser::err::SevenZParserError::new(
                        $crate::parser::err::SevenZParserErrorKind::ToUsizeConversionFailure(e),
                    ))),
                }
            )+
        }
    };
}
pub(crate) use to_usize_or_err;
