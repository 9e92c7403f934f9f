use thiserror::Error;

/// A data line could not be turned into a [`crate::Variant`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed record {}in column {column}: {message}", fmt_location(.location))]
pub struct MalformedRecordError {
    pub column: String,
    pub message: String,
    /// CHROM and POS, when both parsed before the failing column.
    pub location: Option<(String, u64)>,
}

impl MalformedRecordError {
    pub(crate) fn new(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn at(mut self, chrom: &str, pos: u64) -> Self {
        self.location = Some((chrom.to_owned(), pos));
        self
    }
}

fn fmt_location(location: &Option<(String, u64)>) -> String {
    match location {
        Some((chrom, pos)) => format!("at {}:{} ", chrom, pos),
        None => String::new(),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed header line `{line}`: {message}")]
pub struct MalformedHeaderError {
    pub line: String,
    pub message: String,
}

impl MalformedHeaderError {
    pub(crate) fn new(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed CIGAR `{text}` at offset {offset}")]
pub struct MalformedCigarError {
    pub text: String,
    pub offset: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("cannot align an empty sequence")]
    EmptyInput,
    #[error("sequence of length {length} exceeds the alignment ceiling of {max}")]
    TooLong { length: usize, max: usize },
    #[error("invalid scoring: {0}")]
    InvalidScoring(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IllegalEditScriptError {
    #[error("negative length {length} for operation {op}")]
    NegativeLength { length: i64, op: char },
    #[error("edit scripts are not adjacent: first ends at {end}, second starts at {start}")]
    NotAdjacent { end: u64, start: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("left-aligning {chrom}:{pos} would move the anchor before the start of the contig")]
pub struct AnchorUnderflowError {
    pub chrom: String,
    pub pos: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncompatibleMergeError {
    #[error("no records to merge")]
    Empty,
    #[error("cannot merge {chrom}:{pos} with {other_chrom}:{other_pos}")]
    Position {
        chrom: String,
        pos: u64,
        other_chrom: String,
        other_pos: u64,
    },
    #[error("REF mismatch at {chrom}:{pos}: `{expected}` vs `{found}`")]
    Ref {
        chrom: String,
        pos: u64,
        expected: String,
        found: String,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecordError),
    #[error(transparent)]
    MalformedHeader(#[from] MalformedHeaderError),
    #[error(transparent)]
    MalformedCigar(#[from] MalformedCigarError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error(transparent)]
    IllegalEditScript(#[from] IllegalEditScriptError),
    #[error(transparent)]
    AnchorUnderflow(#[from] AnchorUnderflowError),
    #[error(transparent)]
    IncompatibleMerge(#[from] IncompatibleMergeError),
    #[error("{chrom}:{pos}: {source}")]
    AtVariant {
        chrom: String,
        pos: u64,
        source: Box<Error>,
    },
    #[error("line {line}: {source}")]
    AtLine { line: usize, source: Box<Error> },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn at_variant(chrom: &str, pos: u64, source: impl Into<Error>) -> Self {
        Error::AtVariant {
            chrom: chrom.to_owned(),
            pos,
            source: Box::new(source.into()),
        }
    }

    pub(crate) fn at_line(line: usize, source: impl Into<Error>) -> Self {
        Error::AtLine {
            line,
            source: Box::new(source.into()),
        }
    }

    /// The innermost error, with any location context stripped.
    pub fn kind(&self) -> &Error {
        match self {
            Error::AtVariant { source, .. } | Error::AtLine { source, .. } => source.kind(),
            e => e,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
