use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::LineFrameError;

pub const LINE_DELIMITER: u8 = b'\n';

/// Reads one newline-terminated frame, without the terminator.
///
/// A trailing `\r` is stripped as well. Returns `Ok(None)` when the stream
/// ends cleanly on a frame boundary. The bound applies to the payload only, so
/// an oversized line is rejected before it is fully buffered.
pub async fn read_line_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, LineFrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    scan_line(reader, &mut frame, max_frame_bytes).await
}

/// Line reader that keeps a partially scanned frame between calls.
///
/// [`LineReader::next_frame`] is cancel safe: dropping the future (for example
/// when it loses a `tokio::select!` race) keeps every byte already taken from
/// the inner reader, and the next call resumes the same frame.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    max_frame_bytes: usize,
    pending: Vec<u8>,
}

impl<R> LineReader<R> {
    #[must_use]
    pub const fn new(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            max_frame_bytes,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, LineFrameError> {
        scan_line(&mut self.inner, &mut self.pending, self.max_frame_bytes).await
    }
}

async fn scan_line<R>(
    reader: &mut R,
    frame: &mut Vec<u8>,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, LineFrameError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await.map_err(LineFrameError::Io)?;
        if available.is_empty() {
            if frame.is_empty() {
                return Ok(None);
            }
            let scanned = frame.len();
            frame.clear();
            return Err(LineFrameError::UnexpectedEof { scanned });
        }

        let (chunk, terminated) = match available.iter().position(|byte| *byte == LINE_DELIMITER)
        {
            Some(index) => (&available[..index], true),
            None => (available, false),
        };

        let scanned = frame.len() + chunk.len();
        if scanned > max_frame_bytes {
            frame.clear();
            return Err(LineFrameError::FrameTooLarge {
                max_frame_bytes,
                scanned,
            });
        }

        frame.extend_from_slice(chunk);
        let consumed = chunk.len() + usize::from(terminated);
        reader.consume(consumed);

        if terminated {
            if frame.last() == Some(&b'\r') {
                frame.pop();
            }
            return Ok(Some(std::mem::take(frame)));
        }
    }
}

pub async fn write_line_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_frame_bytes: usize,
) -> Result<(), LineFrameError>
where
    W: AsyncWrite + Unpin,
{
    if let Some(offset) = payload.iter().position(|byte| *byte == LINE_DELIMITER) {
        return Err(LineFrameError::EmbeddedDelimiter { offset });
    }

    if payload.len() > max_frame_bytes {
        return Err(LineFrameError::FrameTooLarge {
            max_frame_bytes,
            scanned: payload.len(),
        });
    }

    writer
        .write_all(payload)
        .await
        .map_err(LineFrameError::Io)?;
    writer
        .write_all(&[LINE_DELIMITER])
        .await
        .map_err(LineFrameError::Io)?;
    writer.flush().await.map_err(LineFrameError::Io)?;
    Ok(())
}
