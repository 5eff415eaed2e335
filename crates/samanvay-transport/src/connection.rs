use samanvay_net::{write_line_frame, LineReader};
use samanvay_wire::{decode_live_frame, encode_outbound, LiveEvent, OutboundEvent, WireError};
use tokio::io::{split, AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tracing::{debug, warn};

use crate::TransportError;

#[derive(Debug)]
pub struct LiveEventReader<R> {
    lines: LineReader<BufReader<R>>,
}

impl<R> LiveEventReader<R>
where
    R: AsyncRead + Unpin,
{
    #[must_use]
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            lines: LineReader::new(BufReader::new(reader), max_frame_bytes),
        }
    }

    /// Next decodable event, or `None` once the peer has closed the stream.
    ///
    /// Blank keepalive lines are skipped. Frames that fail to decode are
    /// logged and skipped so one bad payload does not cost the connection;
    /// framing and I/O failures are returned. Cancel safe.
    pub async fn recv_event(&mut self) -> Result<Option<LiveEvent>, TransportError> {
        loop {
            let Some(frame) = self.lines.next_frame().await? else {
                return Ok(None);
            };

            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match decode_live_frame(&frame) {
                Ok(event) => return Ok(Some(event)),
                Err(WireError::UnknownEvent { event }) => {
                    debug!(%event, "ignoring unsupported live event");
                }
                Err(error) => {
                    warn!(%error, bytes = frame.len(), "dropping malformed live frame");
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct LiveEventWriter<W> {
    writer: W,
    max_frame_bytes: usize,
}

impl<W> LiveEventWriter<W>
where
    W: AsyncWrite + Unpin,
{
    #[must_use]
    pub const fn new(writer: W, max_frame_bytes: usize) -> Self {
        Self {
            writer,
            max_frame_bytes,
        }
    }

    pub async fn send_event(&mut self, event: &OutboundEvent) -> Result<(), TransportError> {
        let payload = encode_outbound(event)?;
        write_line_frame(&mut self.writer, &payload, self.max_frame_bytes).await?;
        Ok(())
    }

    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        write_line_frame(&mut self.writer, payload, self.max_frame_bytes).await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct LiveChannelConnection<IO> {
    io: IO,
    max_frame_bytes: usize,
}

impl<IO> LiveChannelConnection<IO>
where
    IO: AsyncRead + AsyncWrite,
{
    #[must_use]
    pub const fn new(io: IO, max_frame_bytes: usize) -> Self {
        Self {
            io,
            max_frame_bytes,
        }
    }

    #[must_use]
    pub fn into_split(self) -> (LiveEventReader<ReadHalf<IO>>, LiveEventWriter<WriteHalf<IO>>) {
        let (reader, writer) = split(self.io);
        (
            LiveEventReader::new(reader, self.max_frame_bytes),
            LiveEventWriter::new(writer, self.max_frame_bytes),
        )
    }
}
