//! Streaming sessions: one data producer coupled to one observer connection.
//!
//! Every session runs on its own task, owns its observer connection for its
//! whole lifetime, and shares no mutable state with other sessions. Session
//! lifetime is bounded by whichever side ends first — producer exhaustion,
//! observer write failure, or cancellation — and the ending side always
//! tears the other down.

pub mod bridge;
pub mod stats;
pub mod system;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

use crate::{AppError, Result};

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The producer was exhausted (process exit, stream EOF, or a terminal
    /// producer error).
    SourceClosed,
    /// A write to the observer failed — the client is gone.
    ObserverGone,
    /// The session's cancellation token fired.
    Cancelled,
}

/// Push half of an observer connection.
///
/// Implemented for the WebSocket transport in production; tests substitute
/// recording or failing observers. Messages are opaque text frames carrying
/// raw log bytes or JSON-encoded metrics objects, delivered in push order.
#[async_trait]
pub trait Observer: Send {
    /// Push one text frame to the remote client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Connection` when the write fails; the session must
    /// treat this as terminal.
    async fn push_text(&mut self, text: String) -> Result<()>;

    /// Close the connection normally. Best effort.
    async fn close(&mut self);
}

#[async_trait]
impl Observer for WebSocket {
    async fn push_text(&mut self, text: String) -> Result<()> {
        self.send(Message::Text(text.into()))
            .await
            .map_err(|err| AppError::Connection(err.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.send(Message::Close(None)).await;
    }
}
