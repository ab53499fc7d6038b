use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A byte sequence in a content stream is not a valid token.
    #[error("malformed token at offset {offset}: {reason}")]
    Lex { offset: usize, reason: &'static str },
    /// Opening and closing operators of a content stream do not pair up.
    #[error("invalid content stream: {0}")]
    ContentStream(#[from] ContentStreamError),
    /// A state the parser considers impossible was reached.
    #[error("internal logic error: {0}")]
    InternalLogic(&'static str),
    /// A value lies outside the range allowed for it.
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),
    /// Error while parsing a cross reference table or chain.
    #[error("invalid cross-reference table: {0}")]
    InvalidXref(#[from] XrefError),
    /// The dictionary of a cross reference stream is malformed.
    #[error("invalid cross-reference stream: {0}")]
    InvalidXrefStream(String),
    /// A cross reference stream record has a type other than 0, 1 or 2.
    #[error("invalid cross-reference entry type {0}")]
    InvalidXrefType(u64),
    /// No cross reference data could be read at the expected location.
    #[error("no cross-reference data at offset {offset}")]
    NoXref { offset: usize },
    /// A buffer could not be reserved.
    #[error("could not allocate {requested} bytes")]
    OutOfMemory { requested: usize },
    /// An Object has the wrong type, e.g. the Object is an Array where a Name would be expected.
    #[error("object has wrong type; expected type {expected} but found type {found}")]
    ObjectType {
        expected: &'static str,
        found: &'static str,
    },
    /// Dictionary key was not found.
    #[error("missing required dictionary key \"{0}\"")]
    DictKey(String),
    /// The stream couldn't be decompressed.
    #[error("couldn't decompress stream: {0}")]
    Decompress(#[from] DecompressError),
    /// Failed to parse input.
    #[error("couldn't parse input: {0}")]
    Parse(#[from] ParseError),
    /// IO error
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentStreamError {
    #[error(
        "found mismatching opening/closing operators at token number {token_index}. Got: {found}, expected {expected}. Context stack was: {stack}."
    )]
    Mismatch {
        token_index: usize,
        found: String,
        expected: String,
        /// Opening keywords of the open scopes, outermost first.
        stack: String,
    },
    #[error("closing operator {found} at token number {token_index} has no matching opening operator")]
    Unmatched { token_index: usize, found: String },
    #[error("operator {keyword} at token number {token_index} does not take operands")]
    UnexpectedOperands { token_index: usize, keyword: String },
    #[error("operator {keyword} cannot be inserted as a {expected} node")]
    WrongKeywordClass { keyword: String, expected: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XrefError {
    /// Could not parse cross reference table.
    #[error("could not parse xref at offset {offset}")]
    Parse { offset: usize },
    /// Could not find start of cross reference table.
    #[error("invalid start value")]
    Start,
    /// The trailer's "Prev" field was invalid.
    #[error("invalid start value in Prev field")]
    PrevStart,
    /// The trailer's "XRefStm" field was invalid.
    #[error("invalid stream start value")]
    StreamStart,
    /// The same section offset was reached twice.
    #[error("cross-reference chain loops back to offset {0}")]
    Cycle(usize),
    #[error("cross-reference chain is longer than {0} sections")]
    ChainTooLong(usize),
    /// A subsection reaches past the largest allowed object number.
    #[error("subsection {first} {count} exceeds the object limit {max}")]
    ObjectCount { first: i64, count: i64, max: u32 },
    /// A 20 byte table entry could not be parsed.
    #[error("malformed entry for object {object} at offset {offset}")]
    Entry { object: u32, offset: usize },
    #[error("missing required key /{0}")]
    MissingKey(&'static str),
    /// The object at a cross reference offset is not a /Type /XRef stream.
    #[error("object is not a cross-reference stream")]
    NotXrefStream,
}

#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("unsupported filter {0}")]
    UnsupportedFilter(String),
    #[error("Flate decoding failed: {0}")]
    Flate(String),
    #[error("LZW decoding failed: {0}")]
    Lzw(String),
    #[error("predictor decoding failed: {0}")]
    Predictor(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid indirect object at offset {offset}")]
    InvalidIndirectObject { offset: usize },
    #[error("invalid file trailer")]
    InvalidTrailer,
}
