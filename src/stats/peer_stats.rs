//! Per-peer receive statistics.
//!
//! Updated from each published indication. Traffic whose user never resolved
//! to a peer is folded into a sentinel bucket so aggregate radio totals stay
//! correct; rate derivation is skipped for that bucket.

use std::collections::HashMap;

use crate::peers::{PeerId, INVALID_PEER_ID};
use crate::ppdu::{
    tid_to_wme_ac, Preamble, ReceptionType, NUM_BANDWIDTHS, NUM_GI, NUM_PREAMBLES,
    NUM_RECEPTION_TYPES, NUM_WME_AC,
};
use crate::ratetable::rate_kbps;
use crate::stats::indication::PpduIndication;

/// Inclusive upper bound on MCS across all preamble classes.
pub const MAX_MCS: usize = 12;

const MAX_NSS: usize = 8;

/// Low-pass filtered average, seeded by the first sample.
fn lpf(avg: u32, sample: u32) -> u32 {
    if avg == 0 {
        sample
    } else {
        (avg * 7 + sample) / 8
    }
}

/// MU-specific counters, one slot per MU reception type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuRxStats {
    pub ppdu_cnt: u32,
    pub mpdu_cnt_fcs_ok: u32,
    pub mpdu_cnt_fcs_err: u32,
    pub mcs_count: [u32; MAX_MCS + 1],
}

/// Receive statistics for one peer.
#[derive(Debug, Clone, Default)]
pub struct PeerRxStats {
    pub ppdu_cnt: u32,
    pub mpdu_cnt_fcs_ok: u32,
    pub mpdu_cnt_fcs_err: u32,
    pub num_bytes: u64,
    pub tcp_msdu_count: u32,
    pub udp_msdu_count: u32,
    pub other_msdu_count: u32,
    pub retries: u32,
    pub ampdu_cnt: u32,
    pub non_ampdu_cnt: u32,
    pub mcs_count: [u32; MAX_MCS + 1],
    /// MCS histogram per preamble class; MCS beyond the preamble's range
    /// lands in the overflow bucket at [`MAX_MCS`].
    pub pkt_type_mcs: [[u32; MAX_MCS + 1]; NUM_PREAMBLES],
    /// SU AX PPDUs by MCS.
    pub su_ax_ppdu_mcs: [u32; MAX_MCS + 1],
    /// Frames per WME access category, from the user's QoS TID.
    pub wme_ac_frames: [u32; NUM_WME_AC],
    pub wme_ac_bytes: [u64; NUM_WME_AC],
    pub nss_count: [u32; MAX_NSS],
    pub gi_count: [u32; NUM_GI],
    pub bw_count: [u32; NUM_BANDWIDTHS],
    pub preamble_count: [u32; NUM_PREAMBLES],
    pub reception_type: [u32; NUM_RECEPTION_TYPES],
    /// Indexed by [`ReceptionType::index`] minus one (MU types only).
    pub mu: [MuRxStats; NUM_RECEPTION_TYPES - 1],
    pub avg_snr_db: u32,
    pub last_rate_kbps: u32,
    pub avg_rate_kbps: u32,
}

/// Store keyed by peer id, with a sentinel bucket for unresolved traffic.
#[derive(Debug, Default)]
pub struct PeerStatsStore {
    peers: HashMap<PeerId, PeerRxStats>,
    invalid: PeerRxStats,
}

impl PeerStatsStore {
    pub fn get(&self, peer_id: PeerId) -> Option<&PeerRxStats> {
        if peer_id == INVALID_PEER_ID {
            Some(&self.invalid)
        } else {
            self.peers.get(&peer_id)
        }
    }

    pub fn remove(&mut self, peer_id: PeerId) {
        self.peers.remove(&peer_id);
    }

    /// Fold one indication into per-peer stats. Derived rates are written
    /// back into the indication's user records so the published event carries
    /// them. Returns the resolved peers whose stats changed.
    pub fn update_rx_stats(&mut self, ind: &mut PpduIndication) -> Vec<PeerId> {
        let rx = ind.rx_status.clone();
        let mut changed = Vec::new();
        let mut rate_sum = 0u64;
        let mut rate_cnt = 0u32;

        for user in &mut ind.users {
            let entry = if user.peer_id == INVALID_PEER_ID {
                &mut self.invalid
            } else {
                self.peers.entry(user.peer_id).or_default()
            };

            entry.ppdu_cnt += 1;
            entry.mpdu_cnt_fcs_ok += u32::from(user.mpdu_cnt_fcs_ok);
            entry.mpdu_cnt_fcs_err += u32::from(user.mpdu_cnt_fcs_err);
            entry.num_bytes += u64::from(user.mpdu_ok_byte_count);
            entry.tcp_msdu_count += user.tcp_msdu_count;
            entry.udp_msdu_count += user.udp_msdu_count;
            entry.other_msdu_count += user.other_msdu_count;
            entry.retries += user.retried;
            if user.is_ampdu {
                entry.ampdu_cnt += 1;
            } else {
                entry.non_ampdu_cnt += 1;
            }

            let mcs = usize::from(user.mcs).min(MAX_MCS);
            entry.mcs_count[mcs] += 1;
            let mcs_bucket = if usize::from(user.mcs) < rx.preamble.max_mcs() {
                usize::from(user.mcs)
            } else {
                MAX_MCS
            };
            entry.pkt_type_mcs[rx.preamble.index()][mcs_bucket] += 1;
            if rx.preamble == Preamble::Dot11Ax && rx.reception == ReceptionType::Su {
                entry.su_ax_ppdu_mcs[mcs_bucket] += 1;
            }
            if let Some(ac) = tid_to_wme_ac(user.tid) {
                entry.wme_ac_frames[ac] +=
                    user.tcp_msdu_count + user.udp_msdu_count + user.other_msdu_count;
                entry.wme_ac_bytes[ac] += u64::from(user.mpdu_ok_byte_count);
            }
            let nss = usize::from(user.nss.max(1) - 1).min(MAX_NSS - 1);
            entry.nss_count[nss] += 1;
            entry.gi_count[rx.gi.index()] += 1;
            entry.bw_count[rx.bw.index()] += 1;
            entry.preamble_count[rx.preamble.index()] += 1;
            entry.reception_type[rx.reception.index()] += 1;
            if rx.reception.is_mu() {
                let mu = &mut entry.mu[rx.reception.index() - 1];
                mu.ppdu_cnt += 1;
                mu.mpdu_cnt_fcs_ok += u32::from(user.mpdu_cnt_fcs_ok);
                mu.mpdu_cnt_fcs_err += u32::from(user.mpdu_cnt_fcs_err);
                mu.mcs_count[mcs_bucket] += 1;
            }

            // combined RSSI plus the bandwidth gain offset, over the noise
            // floor, gives the SNR sample
            let snr = i32::from(rx.rssi_comb) + rx.bw.gain_offset_db() - i32::from(rx.noise_floor);
            if snr > 0 {
                entry.avg_snr_db = lpf(entry.avg_snr_db, snr as u32);
            }

            if user.peer_id != INVALID_PEER_ID {
                if let Some(rate) = rate_kbps(rx.preamble, rx.bw, rx.gi, user.mcs, user.nss) {
                    entry.last_rate_kbps = rate;
                    entry.avg_rate_kbps = lpf(entry.avg_rate_kbps, rate);
                    user.rate_kbps = rate;
                    rate_sum += u64::from(rate);
                    rate_cnt += 1;
                }
            }
            // the sentinel bucket notifies too, rate derivation aside
            changed.push(user.peer_id);
        }

        if rate_cnt > 0 {
            ind.rx_rate_kbps = (rate_sum / u64::from(rate_cnt)) as u32;
        }
        changed
    }
}
