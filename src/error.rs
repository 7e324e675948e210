use std::io;

use thiserror::Error;

/// Result of every structural decode operation in this crate.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// A structural failure while decoding a class file. Every failure carries the
/// byte offset (relative to the start of the buffer handed to the reader) at
/// which the malformed or missing data was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte offset {offset}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        DecodeError { offset, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    /// The class file major version exceeds [`crate::MAX_SUPPORTED_MAJOR`].
    #[error("unsupported class file major version {0}")]
    UnsupportedVersion(u16),
    /// A declared length runs past the end of the buffer.
    #[error("declared length exceeds remaining input")]
    TruncatedInput,
    /// An unknown or malformed constant pool tag, or a reference to a
    /// constant pool index whose entry has the wrong tag for the site.
    #[error("bad constant pool tag {0}")]
    BadConstantTag(u8),
    /// An unknown primary opcode, or an unknown opcode after a `wide` prefix.
    #[error("bad opcode 0x{0:02x}")]
    BadOpcode(u8),
    /// A reserved `frame_type` byte, a bad verification type tag, or a frame
    /// offset outside the method's code.
    #[error("bad stack map frame type {0}")]
    BadFrameType(u8),
    /// A `target_type` byte that cannot appear at the current site.
    #[error("bad type annotation target 0x{0:02x}")]
    BadTypeAnnotationTarget(u8),
    /// An unknown tag in an annotation `element_value`.
    #[error("bad annotation value tag {0}")]
    BadAnnotationValueTag(u8),
}

/// Failure while locating or loading class bytes from the outside world. The
/// decode layer never produces these; only [`crate::loader`] and the stream
/// constructor do.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("class {0} not found in class path")]
    NotFound(String),
}
