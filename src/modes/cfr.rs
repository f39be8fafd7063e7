//! Channel-frequency-response capture correlation.
//!
//! When the baseband captured the channel for a PPDU, an indication is
//! published even if the stats paths would otherwise drop it, so the capture
//! can be correlated with its PPDU metadata upstream.

use crate::events::{EventBus, EventKind, EventPayload, MonEvent};
use crate::peers::PeerDirectory;
use crate::ppdu::PpduInfo;
use crate::stats::indication::build_indication;
use crate::stats::mon_stats::MonStats;

/// Fold this PPDU's capture status into the CFR debug counters.
pub fn update_cfr_dbg_stats(stats: &mut MonStats, ppdu: &PpduInfo) {
    let cfr = &ppdu.cfr;
    if cfr.bb_captured_channel {
        stats.cfr.bb_captured_channel_cnt += 1;
    }
    if cfr.bb_captured_timeout {
        stats.cfr.bb_captured_timeout_cnt += 1;
    }
    if cfr.rx_location_info_valid {
        stats.cfr.rx_loc_info_valid_cnt += 1;
    }
    let status = usize::from(cfr.chan_capture_status).min(stats.cfr.chan_capture_status.len() - 1);
    stats.cfr.chan_capture_status[status] += 1;
}

/// Publish a CFR-bearing indication for a completed PPDU, when the stats
/// paths did not already publish one.
pub fn handle_cfr(
    ppdu: &PpduInfo,
    directory: &dyn PeerDirectory,
    bus: &EventBus,
    stats: &mut MonStats,
) {
    update_cfr_dbg_stats(stats, ppdu);
    let cfr = &ppdu.cfr;
    if !cfr.bb_captured_channel && !cfr.bb_captured_timeout && !cfr.rx_location_info_valid {
        return;
    }
    let ind = build_indication(ppdu, directory, stats);
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
}
