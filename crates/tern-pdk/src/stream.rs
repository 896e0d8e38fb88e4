//! A server-tracked output stream.
//!
//! Obtained from [`ReceiveContext::open_stream`](crate::context::ReceiveContext::open_stream);
//! chunks are appended with [`Stream::write`] and the assembled message is
//! settled by [`Stream::close`]. Every frame carries the stream identity the
//! server assigned at open.

use std::sync::atomic::{AtomicBool, Ordering};

use tern_proto::{Header, StreamCloseReq, StreamInfo, StreamWriteReq};

use crate::error::{PdkError, Result};
use crate::runtime::Host;

pub struct Stream {
    stream_no: String,
    from_uid: String,
    channel_id: String,
    channel_type: u8,
    header: Header,
    closed: AtomicBool,
    host: Host,
}

impl Stream {
    pub(crate) fn new(info: StreamInfo, stream_no: String, host: Host) -> Self {
        Self {
            stream_no,
            from_uid: info.from_uid,
            channel_id: info.channel_id,
            channel_type: info.channel_type,
            header: info.header,
            closed: AtomicBool::new(false),
            host,
        }
    }

    /// The server-assigned stream identity.
    pub fn stream_no(&self) -> &str {
        &self.stream_no
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Append one chunk.
    ///
    /// Streamed chunks never bump unread badges: the red-dot flag is forced
    /// off no matter what the stream was opened with. Fails locally, without
    /// touching the transport, when the stream was never assigned an
    /// identity or is already closed.
    pub async fn write(&self, payload: Vec<u8>) -> Result<()> {
        if self.stream_no.is_empty() {
            return Err(PdkError::StreamNotOpen);
        }
        if self.is_closed() {
            return Err(PdkError::StreamClosed(self.stream_no.clone()));
        }
        let mut header = self.header.clone();
        header.red_dot = false;
        self.host
            .stream_write(StreamWriteReq {
                stream_no: self.stream_no.clone(),
                header,
                from_uid: self.from_uid.clone(),
                channel_id: self.channel_id.clone(),
                channel_type: self.channel_type,
                payload,
            })
            .await
    }

    /// Settle the stream. Safe without a prior write; closing twice is a
    /// no-op success.
    pub async fn close(&self) -> Result<()> {
        if self.stream_no.is_empty() {
            return Err(PdkError::StreamNotOpen);
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.host
            .stream_close(StreamCloseReq {
                stream_no: self.stream_no.clone(),
                channel_id: self.channel_id.clone(),
                channel_type: self.channel_type,
            })
            .await
    }
}
