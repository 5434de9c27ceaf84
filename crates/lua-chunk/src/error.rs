use thiserror::Error;

/// Reasons a binary chunk can be rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ChunkError {
    #[error("not a binary chunk (bad signature)")]
    Signature,

    #[error("version mismatch: expected 0x53, got {0:#04x}")]
    Version(u8),

    #[error("format mismatch: expected 0, got {0}")]
    Format(u8),

    #[error("corrupted header: {0}")]
    Header(&'static str),

    #[error("truncated chunk: need {need} bytes at offset {offset}")]
    Truncated { need: usize, offset: usize },

    #[error("unknown constant tag {0:#04x}")]
    ConstantTag(u8),

    #[error("string is not valid UTF-8 at offset {0}")]
    Utf8(usize),
}
