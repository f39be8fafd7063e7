//! M-copy capture.
//!
//! Delivers a copy of every FCS-passing MPDU payload out of the status
//! buffers. An MPDU may start in one status buffer and have its FCS verdict
//! arrive in the next; the state here caches the split buffer until the
//! verdict resolves, then delivers or drops it.

use log::warn;

use crate::buffer::MonBuffer;
use crate::config::McopyMode;
use crate::events::{EventBus, EventKind, EventPayload, MonEvent};
use crate::ppdu::{MpduEnd, MsduPayload};
use crate::stats::mon_stats::MonStats;

/// Bytes between the payload marker word and the start of the frame.
const PAYLOAD_MARKER_LEN: usize = 4;

#[derive(Debug, Default)]
pub struct McopyState {
    cached: Option<MonBuffer>,
    cached_ppdu_id: u32,
    /// FCS verdict for the cached buffer's trailing MPDU, once known.
    cached_verdict: Option<bool>,
    /// Last PPDU id a single-mode copy was delivered for.
    last_delivered_ppdu: Option<u32>,
    fcs_ok_cnt: u16,
    fcs_err_cnt: u16,
}

impl McopyState {
    pub fn reset(&mut self) {
        *self = McopyState::default();
    }

    pub fn has_cache(&self) -> bool {
        self.cached.is_some()
    }

    pub fn cache(&mut self, buf: MonBuffer) {
        self.cached = Some(buf);
    }

    /// Account one MPDU-end marker. A marker arriving before any MPDU header
    /// in the current buffer resolves the cached buffer's trailing MPDU and
    /// is not counted against the current buffer's header count.
    pub fn on_mpdu_end(&mut self, end: &MpduEnd) {
        if end.mpdu_cnt_so_far == 0 {
            if self.cached_verdict.is_none() {
                self.cached_verdict = Some(end.fcs_ok);
            }
            return;
        }
        if end.fcs_ok {
            self.fcs_ok_cnt += 1;
        } else {
            self.fcs_err_cnt += 1;
        }
    }

    fn deliver(bus: &EventBus, stats: &mut MonStats, ppdu_id: u32, buf: MonBuffer) {
        if bus.publish(MonEvent {
            kind: EventKind::RxData,
            ppdu_id,
            payload: EventPayload::Buffer(buf),
        }) {
            stats.mcopy_delivered += 1;
        }
    }

    fn single_mode_allows(&mut self, mode: McopyMode, ppdu_id: u32, stats: &mut MonStats) -> bool {
        if mode != McopyMode::Single {
            return true;
        }
        if self.last_delivered_ppdu == Some(ppdu_id) {
            stats.mcopy_dup_dropped += 1;
            return false;
        }
        self.last_delivered_ppdu = Some(ppdu_id);
        true
    }

    /// Process one status buffer's worth of m-copy state: flush a resolved
    /// cache, copy out this buffer's FCS-passing payloads, and cache the
    /// buffer if its last MPDU's verdict is still outstanding.
    pub fn process(
        &mut self,
        mode: McopyMode,
        ppdu_id: u32,
        mpdu_cnt: u16,
        payloads: &[MsduPayload],
        buf: &MonBuffer,
        bus: &EventBus,
        stats: &mut MonStats,
    ) {
        if let Some(verdict) = self.cached_verdict.take() {
            if let Some(cached) = self.cached.take() {
                if verdict && self.single_mode_allows(mode, self.cached_ppdu_id, stats) {
                    Self::deliver(bus, stats, self.cached_ppdu_id, cached);
                }
            }
        }

        for payload in payloads {
            let start = payload.offset + PAYLOAD_MARKER_LEN;
            let end = start + payload.payload_len;
            let data = buf.data();
            if end > data.len() {
                continue;
            }
            if !self.single_mode_allows(mode, ppdu_id, stats) {
                continue;
            }
            Self::deliver(bus, stats, ppdu_id, MonBuffer::from_bytes(&data[start..end]));
        }

        // an MPDU header without a matching end marker means the verdict
        // lands in the next status buffer
        if self.fcs_ok_cnt + self.fcs_err_cnt != mpdu_cnt {
            if self.cached.is_some() {
                warn!("mcopy cache occupied, dropping split buffer for ppdu {ppdu_id:#x}");
                stats.mcopy_cache_drop += 1;
            } else {
                self.cached = Some(buf.clone());
                self.cached_ppdu_id = ppdu_id;
            }
        }
        self.fcs_ok_cnt = 0;
        self.fcs_err_cnt = 0;
    }
}
