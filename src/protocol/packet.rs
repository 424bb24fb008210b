//! Length-framed packet transport
//!
//! Every message travels as a fixed header followed by equally sized chunks:
//!
//! ```text
//! +-------------+-------------+-----------+-----------+-----+---------------------+
//! | packets u32 | padding u32 | chunk 0   | chunk 1   | ... | chunk p-1 + padding |
//! +-------------+-------------+-----------+-----------+-----+---------------------+
//! ```
//!
//! `packets = ceil(len / chunk)` and `padding` is the number of zero bytes
//! appended to the last chunk. Both header fields are big-endian. An empty
//! payload is sent as `0 / 0` with no chunks.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::ProtocolError;

/// Upper bound on a reassembled message
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Frame header preceding the chunks of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packets: u32,
    pub padding: u32,
}

impl PacketHeader {
    /// Header for a payload of `len` bytes split into `chunk_size` chunks
    pub fn for_payload(len: usize, chunk_size: usize) -> Result<Self, ProtocolError> {
        if chunk_size == 0 {
            return Err(ProtocolError::InvalidChunkSize(chunk_size));
        }
        if len > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::MessageTooLarge {
                size: len,
                limit: MAX_MESSAGE_BYTES,
            });
        }
        let packets = len.div_ceil(chunk_size);
        let remainder = len % chunk_size;
        let padding = if remainder == 0 { 0 } else { chunk_size - remainder };
        Ok(Self {
            packets: packets as u32,
            padding: padding as u32,
        })
    }

    /// Bytes carried by the chunks, padding included
    pub fn framed_len(&self, chunk_size: usize) -> usize {
        self.packets as usize * chunk_size
    }

    fn validate(&self, chunk_size: usize) -> Result<(), ProtocolError> {
        let padding = self.padding as usize;
        let invalid_padding = if self.packets == 0 {
            padding != 0
        } else {
            padding >= chunk_size
        };
        if invalid_padding {
            return Err(ProtocolError::InvalidPadding {
                padding,
                chunk_size,
            });
        }
        let framed = self.framed_len(chunk_size);
        if framed > MAX_MESSAGE_BYTES + chunk_size {
            return Err(ProtocolError::MessageTooLarge {
                size: framed,
                limit: MAX_MESSAGE_BYTES,
            });
        }
        Ok(())
    }
}

/// Write `payload` as a framed message
pub async fn send_packets<W>(
    writer: &mut W,
    payload: &[u8],
    chunk_size: usize,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let header = PacketHeader::for_payload(payload.len(), chunk_size)?;
    writer.write_u32(header.packets).await?;
    writer.write_u32(header.padding).await?;

    for chunk in payload.chunks(chunk_size) {
        if chunk.len() == chunk_size {
            writer.write_all(chunk).await?;
        } else {
            let mut last = BytesMut::with_capacity(chunk_size);
            last.put_slice(chunk);
            last.put_bytes(0, chunk_size - chunk.len());
            writer.write_all(&last).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Read one framed message and strip its padding
pub async fn receive_packets<R>(reader: &mut R, chunk_size: usize) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    if chunk_size == 0 {
        return Err(ProtocolError::InvalidChunkSize(chunk_size));
    }

    let header = PacketHeader {
        packets: reader.read_u32().await.map_err(ProtocolError::from_read)?,
        padding: reader.read_u32().await.map_err(ProtocolError::from_read)?,
    };
    header.validate(chunk_size)?;

    let mut buf = BytesMut::zeroed(header.framed_len(chunk_size));
    reader
        .read_exact(&mut buf)
        .await
        .map_err(ProtocolError::from_read)?;
    buf.truncate(buf.len() - header.padding as usize);
    Ok(buf.to_vec())
}

/// A byte stream carrying framed messages with a fixed chunk size
#[derive(Debug)]
pub struct PacketChannel<S> {
    stream: S,
    chunk_size: usize,
}

impl<S> PacketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, chunk_size: usize) -> Self {
        Self { stream, chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        send_packets(&mut self.stream, payload, self.chunk_size).await
    }

    pub async fn receive(&mut self) -> Result<Vec<u8>, ProtocolError> {
        receive_packets(&mut self.stream, self.chunk_size).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.send(text.as_bytes()).await
    }

    pub async fn receive_text(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.receive().await?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
