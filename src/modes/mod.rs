//! Capture-mode dispatch.
//!
//! The dispatcher owns the active capability set and the per-mode state.
//! Configuration changes are requested at any time but latched only at PPDU
//! boundaries, so the PPDU in flight finishes under the configuration it
//! started with.

pub mod cfr;
pub mod mcopy;

use log::info;

use crate::config::CaptureConfig;
use crate::events::{EventBus, EventKind, EventPayload, MonEvent};
use crate::peers::PeerDirectory;
use crate::ppdu::{PpduInfo, AST_INDEX_INVALID};
use crate::stats::indication::build_indication;
use crate::stats::mon_stats::MonStats;
use crate::stats::peer_stats::PeerStatsStore;

use self::mcopy::McopyState;

#[derive(Debug, Default)]
pub struct Dispatcher {
    active: CaptureConfig,
    pending: Option<CaptureConfig>,
    pub mcopy: McopyState,
}

impl Dispatcher {
    pub fn new(cfg: CaptureConfig) -> Self {
        Dispatcher {
            active: cfg,
            pending: None,
            mcopy: McopyState::default(),
        }
    }

    pub fn active(&self) -> CaptureConfig {
        self.active
    }

    /// Stage a configuration change for the next PPDU boundary.
    pub fn request(&mut self, cfg: CaptureConfig) {
        self.pending = Some(cfg);
    }

    /// Apply a staged configuration change. Disabling m-copy discards its
    /// cached split-MPDU state.
    pub fn latch(&mut self) {
        if let Some(cfg) = self.pending.take() {
            if !cfg.mcopy.enabled() {
                self.mcopy.reset();
            }
            info!("capture config latched: {:?}", cfg);
            self.active = cfg;
        }
    }

    /// Build and publish the indication for a completed PPDU. Returns whether
    /// an indication was published.
    ///
    /// PPDUs with no FCS-passing MPDU are dropped. PPDUs whose frame control
    /// or address lookup never resolved are dropped too, unless m-copy is
    /// active or the baseband captured the channel for this PPDU.
    pub fn handle_ppdu_stats(
        &mut self,
        ppdu: &PpduInfo,
        directory: &dyn PeerDirectory,
        bus: &EventBus,
        stats: &mut MonStats,
        peer_stats: &mut PeerStatsStore,
    ) -> bool {
        if ppdu.com.mpdu_cnt_fcs_ok == 0 {
            return false;
        }
        let fc_invalid = !ppdu.rx_status.frame_control_valid;
        let ast_invalid = ppdu.rx_status.ast_index == AST_INDEX_INVALID;
        let bb_captured = ppdu.cfr.bb_captured_channel || ppdu.cfr.bb_captured_timeout;
        if (fc_invalid || ast_invalid) && !self.active.mcopy.enabled() && !bb_captured {
            return false;
        }

        let mut ind = build_indication(ppdu, directory, stats);
        let changed = peer_stats.update_rx_stats(&mut ind);
        let ppdu_id = ind.ppdu_id;
        if bus.publish(MonEvent {
            kind: EventKind::RxPpduDesc,
            ppdu_id,
            payload: EventPayload::Ppdu(Box::new(ind)),
        }) {
            stats.ppdu_indications += 1;
        } else {
            stats.ppdu_publish_fail += 1;
        }
        for peer_id in changed {
            bus.publish(MonEvent {
                kind: EventKind::PeerStatsUpdate,
                ppdu_id: u32::from(peer_id),
                payload: EventPayload::None,
            });
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McopyMode;
    use crate::test_utils::{ppdu_with_users, FakeDirectory};

    fn completed_ppdu(dir_ast: u32) -> PpduInfo {
        let mut ppdu = ppdu_with_users(0x77, &[dir_ast]);
        ppdu.com.mpdu_cnt_fcs_ok = 1;
        ppdu.rx_status.frame_control_valid = true;
        ppdu.rx_status.ast_index = dir_ast;
        ppdu.users[0].mpdu_cnt_fcs_ok = 1;
        ppdu
    }

    #[test]
    fn config_change_waits_for_latch() {
        let mut d = Dispatcher::new(CaptureConfig::default());
        let mut cfg = CaptureConfig::default();
        cfg.enhanced_stats = true;
        d.request(cfg);
        assert!(!d.active().enhanced_stats);
        d.latch();
        assert!(d.active().enhanced_stats);
    }

    #[test]
    fn disabling_mcopy_clears_cached_state() {
        let mut d = Dispatcher::new(CaptureConfig {
            mcopy: McopyMode::Full,
            ..CaptureConfig::default()
        });
        d.mcopy.cache(crate::buffer::MonBuffer::from_bytes(&[1]));
        d.request(CaptureConfig::default());
        d.latch();
        assert!(!d.mcopy.has_cache());
    }

    #[test]
    fn all_fcs_fail_ppdu_produces_no_indication() {
        let dir = FakeDirectory::with_peer(1, 5, [3; 6]);
        let (bus, mut rx) = EventBus::channel();
        let mut stats = MonStats::default();
        let mut peers = PeerStatsStore::default();
        let mut d = Dispatcher::new(CaptureConfig {
            enhanced_stats: true,
            ..CaptureConfig::default()
        });
        let mut ppdu = completed_ppdu(1);
        ppdu.com.mpdu_cnt_fcs_ok = 0;
        assert!(!d.handle_ppdu_stats(&ppdu, &dir, &bus, &mut stats, &mut peers));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_fc_dropped_unless_mcopy_or_capture() {
        let dir = FakeDirectory::with_peer(1, 5, [3; 6]);
        let (bus, _rx) = EventBus::channel();
        let mut stats = MonStats::default();
        let mut peers = PeerStatsStore::default();
        let mut d = Dispatcher::new(CaptureConfig {
            enhanced_stats: true,
            ..CaptureConfig::default()
        });

        let mut ppdu = completed_ppdu(1);
        ppdu.rx_status.frame_control_valid = false;
        assert!(!d.handle_ppdu_stats(&ppdu, &dir, &bus, &mut stats, &mut peers));

        // same PPDU passes once a baseband capture is pending
        ppdu.cfr.bb_captured_channel = true;
        assert!(d.handle_ppdu_stats(&ppdu, &dir, &bus, &mut stats, &mut peers));
        assert_eq!(stats.ppdu_indications, 1);
    }

    #[test]
    fn publish_and_peer_update_events_emitted() {
        let dir = FakeDirectory::with_peer(1, 5, [3; 6]);
        let (bus, mut rx) = EventBus::channel();
        let mut stats = MonStats::default();
        let mut peers = PeerStatsStore::default();
        let mut d = Dispatcher::new(CaptureConfig {
            enhanced_stats: true,
            ..CaptureConfig::default()
        });
        assert!(d.handle_ppdu_stats(&completed_ppdu(1), &dir, &bus, &mut stats, &mut peers));
        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, EventKind::RxPpduDesc);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.kind, EventKind::PeerStatsUpdate);
        assert_eq!(dir.outstanding(), 0);
    }
}
