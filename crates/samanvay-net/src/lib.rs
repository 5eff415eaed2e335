mod error;
mod line;

pub use error::LineFrameError;
pub use line::{read_line_frame, write_line_frame, LineReader, LINE_DELIMITER};
