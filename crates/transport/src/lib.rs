//! Per-call duplex audio transport
//!
//! One `CallTransport` exists per active call, identified by
//! `(call_id, conversation_id)`. Inbound frames arrive from the telephony
//! edge; outbound frames are synthesized speech. The engine consumes this
//! as an explicit bounded-channel pair: a producer writes inbound chunks to
//! a bounded queue and a single consumer task drains it, so accumulation
//! policy lives with the consumer rather than in transport callbacks.
//!
//! The telephony signaling itself (dial, hangup, DTMF) is outside this
//! crate; `ChannelTransport` is the in-process binding that an adapter
//! (SIP/WebRTC gateway, test harness) feeds from the far side.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use outcall_core::AudioFrame;

/// Transport errors. Any of these is fatal to the owning session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

impl From<TransportError> for outcall_core::Error {
    fn from(err: TransportError) -> Self {
        outcall_core::Error::Transport(err.to_string())
    }
}

/// Duplex audio connection for one call
#[async_trait]
pub trait CallTransport: Send + Sync + 'static {
    /// Receive the next inbound frame. `None` means the connection dropped
    /// or the callee hung up; the session must terminate.
    async fn recv_frame(&self) -> Option<AudioFrame>;

    /// Send one outbound frame toward the callee
    async fn send_frame(&self, frame: AudioFrame) -> Result<(), TransportError>;

    /// Close the connection from our side
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn call_id(&self) -> &str;

    fn conversation_id(&self) -> &str;
}

/// Bounded-channel transport implementation
///
/// `pair()` returns the engine-side transport and the peer handle the
/// telephony adapter (or a test) drives.
pub struct ChannelTransport {
    call_id: String,
    conversation_id: String,
    inbound_rx: Mutex<mpsc::Receiver<AudioFrame>>,
    outbound_tx: mpsc::Sender<AudioFrame>,
    closed: Arc<AtomicBool>,
}

/// Far side of a `ChannelTransport`: what the telephony adapter holds
pub struct TransportPeer {
    pub inbound_tx: mpsc::Sender<AudioFrame>,
    pub outbound_rx: mpsc::Receiver<AudioFrame>,
    closed: Arc<AtomicBool>,
}

impl TransportPeer {
    /// Push one inbound frame toward the engine
    pub async fn send_inbound(&self, frame: AudioFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.inbound_tx
            .send(frame)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Receive the next outbound frame the engine produced
    pub async fn recv_outbound(&mut self) -> Option<AudioFrame> {
        self.outbound_rx.recv().await
    }

    /// Simulate the callee hanging up
    pub fn hang_up(self) {
        self.closed.store(true, Ordering::Release);
        // Dropping inbound_tx closes the engine's recv side.
    }
}

impl ChannelTransport {
    /// Create a connected transport/peer pair with bounded queues
    pub fn pair(
        call_id: impl Into<String>,
        conversation_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, TransportPeer) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let closed = Arc::new(AtomicBool::new(false));

        let transport = Self {
            call_id: call_id.into(),
            conversation_id: conversation_id.into(),
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            closed: closed.clone(),
        };
        let peer = TransportPeer {
            inbound_tx,
            outbound_rx,
            closed,
        };
        (transport, peer)
    }
}

#[async_trait]
impl CallTransport for ChannelTransport {
    async fn recv_frame(&self) -> Option<AudioFrame> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.inbound_rx.lock().await.recv().await
    }

    async fn send_frame(&self, frame: AudioFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(call_id = %self.call_id, "transport closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn call_id(&self) -> &str {
        &self.call_id
    }

    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (transport, mut peer) = ChannelTransport::pair("call-1", "conv-1", 8);

        peer.send_inbound(AudioFrame::new(vec![1, 2, 3])).await.unwrap();
        let frame = transport.recv_frame().await.unwrap();
        assert_eq!(frame.bytes, vec![1, 2, 3]);

        transport.send_frame(AudioFrame::new(vec![9])).await.unwrap();
        let out = peer.recv_outbound().await.unwrap();
        assert_eq!(out.bytes, vec![9]);
    }

    #[tokio::test]
    async fn test_hangup_ends_inbound_stream() {
        let (transport, peer) = ChannelTransport::pair("call-2", "conv-2", 8);
        peer.hang_up();
        assert!(transport.recv_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_close_rejects_sends() {
        let (transport, _peer) = ChannelTransport::pair("call-3", "conv-3", 8);
        transport.close();
        assert!(transport.is_closed());
        let err = transport.send_frame(AudioFrame::new(vec![0])).await;
        assert!(matches!(err, Err(TransportError::Closed)));
        assert!(transport.recv_frame().await.is_none());
    }
}
