use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Nom(String),

    #[error("invalid lead")]
    InvalidLead,

    #[error("invalid header")]
    InvalidHeader,

    #[error("bad magic")]
    BadMagic,

    #[error("invalid trailer")]
    InvalidTrailer,

    #[error("offset out of bounds")]
    OffsetOob,

    #[error("bad alignment")]
    BadAlign,

    #[error("invalid tag type")]
    TagType,

    #[error("invalid tag size")]
    TagSize,

    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("short write")]
    ShortWrite,

    #[error("data length mismatch")]
    DataLen,

    #[error("no tags")]
    NoTags,

    #[error("invalid tag offset")]
    InvalidOffset,

    #[error("invalid file mode")]
    InvalidFileMode,

    #[error("invalid file index: column {0}")]
    FileIndexColumn(usize),

    #[error("offset: {offset:#x}, {source}")]
    AtOffset {
        offset: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("{source}, tag: {desc}")]
    Tag {
        desc: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error with the offset and tag annotations stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::AtOffset { source, .. } | Error::Tag { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the underlying stream simply ended, as opposed to carrying
    /// malformed data.
    pub fn is_eof(&self) -> bool {
        match self.root() {
            Error::UnexpectedEof => true,
            Error::Io(err) => err.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(error: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match error {
            nom::Err::Error(err) | nom::Err::Failure(err) => {
                Error::Nom(err.code.description().to_string())
            }
            nom::Err::Incomplete(_) => Error::Nom("unhandled incomplete".to_string()),
        }
    }
}
