//! Upward event bus.
//!
//! Indications and captured frames leave the pipeline through an unbounded
//! channel. Publishing never blocks; a missing or closed consumer only bumps
//! a drop counter at the call site.

use tokio::sync::mpsc;

use crate::buffer::MonBuffer;
use crate::stats::indication::PpduIndication;

/// What an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Per-PPDU statistics indication.
    RxPpduDesc,
    /// Captured data frame (m-copy or smart-mesh delivery goes through the
    /// monitor sink instead; this is the pktlog copy).
    RxData,
    /// Captured management or control frame.
    RxMgmtCtrl,
    /// Compressed beamforming report frame (CFR packet log).
    RxCbf,
    /// Raw hardware descriptor bytes (full packet log).
    RxDesc,
    /// Peer statistics changed.
    PeerStatsUpdate,
}

#[derive(Debug)]
pub enum EventPayload {
    Ppdu(Box<PpduIndication>),
    Buffer(MonBuffer),
    None,
}

#[derive(Debug)]
pub struct MonEvent {
    pub kind: EventKind,
    pub ppdu_id: u32,
    pub payload: EventPayload,
}

/// Sender half handed to the pipeline. `publish` consumes the payload either
/// way; on a closed channel the event is dropped and `false` returned.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<MonEvent>,
}

impl EventBus {
    pub fn channel() -> (EventBus, mpsc::UnboundedReceiver<MonEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventBus { tx }, rx)
    }

    pub fn publish(&self, event: MonEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
