use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineFrameError {
    #[error("scan length {scanned} exceeds max frame bound {max_frame_bytes}")]
    FrameTooLarge {
        max_frame_bytes: usize,
        scanned: usize,
    },

    #[error("payload contains a line delimiter at byte {offset}")]
    EmbeddedDelimiter { offset: usize },

    #[error("stream ended mid-frame after scanning {scanned} bytes")]
    UnexpectedEof { scanned: usize },

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}
