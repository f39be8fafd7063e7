//! Monitor-path counters and the TLV balance tracker.
//!
//! Every drop, failure, and skipped path in the pipeline lands in a counter
//! here. The TLV tracker cross-checks that PPDU start, end, and done markers
//! arrive paired with matching PPDU ids, and keeps a short id history for
//! postmortem dumps.

use crate::ppdu::{MAX_USERS, NUM_RECEPTION_TYPES, NUM_RU_SIZES};

/// Depth of the recent-PPDU-id ring.
pub const PPDU_ID_HIST: usize = 128;

/// Channel-frequency-response capture counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CfrStats {
    pub bb_captured_channel_cnt: u32,
    pub bb_captured_timeout_cnt: u32,
    pub rx_loc_info_valid_cnt: u32,
    /// Indexed by the raw channel-capture status (clamped to the last slot).
    pub chan_capture_status: [u32; 4],
    pub cbf_delivered: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TlvTracker {
    start_ppdu_id: Option<u32>,
    end_seen: bool,
}

/// Aggregate monitor statistics for one radio.
#[derive(Debug, Clone)]
pub struct MonStats {
    // TLV balance
    pub status_ppdu_start: u32,
    pub status_ppdu_end: u32,
    pub status_ppdu_done: u32,
    pub status_ppdu_start_mis: u32,
    pub status_ppdu_end_mis: u32,
    pub ppdu_id_mismatch: u32,
    pub ppdu_id_hist: [u32; PPDU_ID_HIST],
    pub ppdu_id_hist_idx: usize,

    // indication path
    pub ppdu_indications: u32,
    pub ppdu_publish_fail: u32,
    pub unresolved_peer: u32,
    pub invalid_ru_size: u32,
    /// RU-size histograms for uplink OFDMA, split by whether the user's
    /// frame control classifies as data.
    pub data_rx_ru_size: [u32; NUM_RU_SIZES],
    pub nondata_rx_ru_size: [u32; NUM_RU_SIZES],
    pub reception_type: [u32; NUM_RECEPTION_TYPES],
    /// MU-OFDMA data PPDUs seen.
    pub data_rx_ppdu: u32,
    /// Histogram of user counts per MU-OFDMA data PPDU, index = number of
    /// users.
    pub data_users: [u32; MAX_USERS + 1],

    // m-copy
    pub mcopy_delivered: u32,
    pub mcopy_dup_dropped: u32,
    pub mcopy_cache_drop: u32,

    // smart mesh
    pub smart_mesh_delivered: u32,
    pub ppdu_drop_cnt: u32,

    // destination / delivery
    pub dest_mpdu_done: u32,
    pub dest_mpdu_drop: u32,
    pub non_std_delivered: u32,
    pub mgmt_ctrl_events: u32,
    pub pktlog_desc_events: u32,

    // status ring replenishment
    pub status_buf_alloc_fail: u32,
    pub status_buf_map_fail: u32,
    pub status_replenish_fail: u32,

    pub cfr: CfrStats,

    tlv: TlvTracker,
}

impl Default for MonStats {
    fn default() -> Self {
        MonStats {
            status_ppdu_start: 0,
            status_ppdu_end: 0,
            status_ppdu_done: 0,
            status_ppdu_start_mis: 0,
            status_ppdu_end_mis: 0,
            ppdu_id_mismatch: 0,
            ppdu_id_hist: [0; PPDU_ID_HIST],
            ppdu_id_hist_idx: 0,
            ppdu_indications: 0,
            ppdu_publish_fail: 0,
            unresolved_peer: 0,
            invalid_ru_size: 0,
            data_rx_ru_size: [0; NUM_RU_SIZES],
            nondata_rx_ru_size: [0; NUM_RU_SIZES],
            reception_type: [0; NUM_RECEPTION_TYPES],
            data_rx_ppdu: 0,
            data_users: [0; MAX_USERS + 1],
            mcopy_delivered: 0,
            mcopy_dup_dropped: 0,
            mcopy_cache_drop: 0,
            smart_mesh_delivered: 0,
            ppdu_drop_cnt: 0,
            dest_mpdu_done: 0,
            dest_mpdu_drop: 0,
            non_std_delivered: 0,
            mgmt_ctrl_events: 0,
            pktlog_desc_events: 0,
            status_buf_alloc_fail: 0,
            status_buf_map_fail: 0,
            status_replenish_fail: 0,
            cfr: CfrStats::default(),
            tlv: TlvTracker::default(),
        }
    }
}

impl MonStats {
    /// Record a PPDU start marker. A start arriving while the previous PPDU
    /// never saw its end marker counts as a start mismatch.
    pub fn tlv_ppdu_start(&mut self, ppdu_id: u32) {
        self.status_ppdu_start += 1;
        if self.tlv.start_ppdu_id.is_some() && !self.tlv.end_seen {
            self.status_ppdu_start_mis += 1;
        }
        self.tlv.start_ppdu_id = Some(ppdu_id);
        self.tlv.end_seen = false;
    }

    /// Record a PPDU end marker. An end with no open start is a mismatch.
    pub fn tlv_ppdu_end(&mut self) {
        self.status_ppdu_end += 1;
        if self.tlv.start_ppdu_id.is_none() {
            self.status_ppdu_end_mis += 1;
        }
        self.tlv.end_seen = true;
    }

    /// Record PPDU completion. The done marker must close the PPDU the open
    /// start named; anything else bumps the id mismatch counter. The id is
    /// pushed into the history ring either way.
    pub fn tlv_ppdu_done(&mut self, ppdu_id: u32) {
        self.status_ppdu_done += 1;
        if self.tlv.start_ppdu_id != Some(ppdu_id) {
            self.ppdu_id_mismatch += 1;
        }
        self.ppdu_id_hist[self.ppdu_id_hist_idx] = ppdu_id;
        self.ppdu_id_hist_idx = (self.ppdu_id_hist_idx + 1) % PPDU_ID_HIST;
        self.tlv = TlvTracker::default();
    }

    /// Most recent PPDU ids, newest last.
    pub fn recent_ppdu_ids(&self, n: usize) -> Vec<u32> {
        let n = n.min(PPDU_ID_HIST);
        (0..n)
            .map(|i| {
                let idx = (self.ppdu_id_hist_idx + PPDU_ID_HIST - n + i) % PPDU_ID_HIST;
                self.ppdu_id_hist[idx]
            })
            .collect()
    }
}
