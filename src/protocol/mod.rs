//! Coordinator/worker wire protocol
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   framed packets (TCP, loopback)   ┌─────────────┐
//! │ Coordinator │ ─────────────────────────────────> │   Worker    │
//! │             │ <───────────────────────────────── │             │
//! └─────────────┘                                    └─────────────┘
//! ```
//!
//! - [`packet`] - header + fixed-size chunk framing over any async stream
//! - [`message`] - text commands, replies and sentinels carried in frames

pub mod message;
pub mod packet;

use std::io;
use thiserror::Error;

pub use message::{CitizenStatus, Command, HandshakeSummary, TravelReply, Verdict};
pub use packet::{receive_packets, send_packets, PacketChannel, PacketHeader, MAX_MESSAGE_BYTES};

/// Errors raised while framing or interpreting messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Underlying socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream mid-message or before a header
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("invalid padding {padding} for chunk size {chunk_size}")]
    InvalidPadding { padding: usize, chunk_size: usize },

    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// A well-framed message with unexpected content
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ProtocolError {
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err)
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// True when the peer is gone rather than misbehaving
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
