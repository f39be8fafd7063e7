//! Per-PPDU statistics indication.
//!
//! `build_indication` flattens the decoded PPDU status into the upward-facing
//! indication: one record per user with peer attribution, plus PPDU-wide
//! aggregates summed over the users. SU and MU receptions share the same
//! populate path; SU is treated as a one-user PPDU.

use crate::peers::{resolve_peer, PeerDirectory, PeerId, INVALID_PEER_ID};
use crate::ppdu::{
    fc, CfrSnapshot, PpduInfo, ReceptionType, RuSize, RxStatus, UserStatus, MAX_USERS, TID_INVALID,
};
use crate::stats::mon_stats::MonStats;

/// One user's share of a PPDU indication.
#[derive(Debug, Clone)]
pub struct UserIndication {
    pub peer_id: PeerId,
    pub mac_addr: [u8; 6],
    pub vdev_id: u8,
    pub tid: u8,
    pub mcs: u8,
    pub nss: u8,
    pub is_ampdu: bool,
    pub frame_control: u16,
    pub frame_control_valid: bool,
    pub qos_control: u16,
    pub qos_control_valid: bool,
    pub first_data_seq_ctrl: u16,
    pub data_frames: bool,
    pub retried: u32,
    pub mpdu_cnt_fcs_ok: u16,
    pub mpdu_cnt_fcs_err: u16,
    pub mpdu_ok_byte_count: u32,
    pub mpdu_err_byte_count: u32,
    pub tcp_msdu_count: u32,
    pub udp_msdu_count: u32,
    pub other_msdu_count: u32,
    pub ru_size: Option<RuSize>,
    pub ru_start_index: u8,
    pub ru_width: u8,
    /// Filled in by the peer stats updater once the rate is derived.
    pub rate_kbps: u32,
}

/// PPDU-wide indication published on the event bus.
#[derive(Debug, Clone)]
pub struct PpduIndication {
    pub ppdu_id: u32,
    /// Peer resolved from the PPDU-wide AST index; the invalid sentinel when
    /// resolution failed.
    pub peer_id: PeerId,
    pub mac_addr: [u8; 6],
    pub vdev_id: u8,
    pub timestamp: u64,
    pub duration: u32,
    pub length: u32,
    pub channel: u16,
    pub rssi: i8,
    pub noise_floor: i16,
    pub rx_status: RxStatus,
    pub fcs_ok_cnt: u16,
    pub fcs_err_cnt: u16,
    pub num_mpdu: u32,
    pub num_msdu: u32,
    pub num_bytes: u64,
    pub num_users: usize,
    pub users: Vec<UserIndication>,
    pub cfr: CfrSnapshot,
    /// Aggregate rate across users, filled by the peer stats updater.
    pub rx_rate_kbps: u32,
}

fn populate_user(
    user: &UserStatus,
    rx: &RxStatus,
    directory: &dyn PeerDirectory,
    stats: &mut MonStats,
) -> UserIndication {
    let (peer_id, mac_addr, vdev_id) = match resolve_peer(directory, user.ast_index) {
        Some(peer) => {
            let meta = peer.meta();
            (meta.peer_id, meta.mac_addr, meta.vdev_id)
        }
        None => {
            stats.unresolved_peer += 1;
            (INVALID_PEER_ID, [0u8; 6], 0)
        }
    };

    // MU user fields fall back to the PPDU-wide PHY status for SU, where the
    // hardware reports them once.
    let mcs = if user.mu_info_valid { user.mcs } else { rx.mcs };
    let nss = if user.mu_info_valid { user.nss } else { rx.nss };

    let fc_word = if user.frame_control_valid {
        user.frame_control
    } else {
        rx.frame_control
    };
    let total_mpdu = u32::from(user.mpdu_cnt_fcs_ok) + u32::from(user.mpdu_cnt_fcs_err);

    // RU fields are copied only for users that resolved to a peer
    let resolved = peer_id != INVALID_PEER_ID;
    let ru_size = if resolved && rx.reception == ReceptionType::MuOfdma && user.mu_info_valid {
        match RuSize::new(user.ru_size) {
            Some(ru) => {
                if fc::is_data(fc_word) {
                    stats.data_rx_ru_size[ru.index()] += 1;
                } else {
                    stats.nondata_rx_ru_size[ru.index()] += 1;
                }
                Some(ru)
            }
            None => {
                stats.invalid_ru_size += 1;
                None
            }
        }
    } else {
        None
    };

    UserIndication {
        peer_id,
        mac_addr,
        vdev_id,
        tid: if user.tid == TID_INVALID { rx.tid } else { user.tid },
        mcs,
        nss,
        is_ampdu: total_mpdu > 1,
        frame_control: fc_word,
        frame_control_valid: user.frame_control_valid || rx.frame_control_valid,
        qos_control: if user.qos_control_valid { user.qos_control } else { 0 },
        qos_control_valid: user.qos_control_valid,
        first_data_seq_ctrl: user.first_data_seq_ctrl,
        data_frames: fc::is_data(fc_word),
        retried: if fc::is_retry_set(fc_word) { total_mpdu } else { 0 },
        mpdu_cnt_fcs_ok: user.mpdu_cnt_fcs_ok,
        mpdu_cnt_fcs_err: user.mpdu_cnt_fcs_err,
        mpdu_ok_byte_count: user.mpdu_ok_byte_count,
        mpdu_err_byte_count: user.mpdu_err_byte_count,
        tcp_msdu_count: user.tcp_msdu_count,
        udp_msdu_count: user.udp_msdu_count,
        other_msdu_count: user.other_msdu_count,
        ru_start_index: if ru_size.is_some() { user.ru_start_index } else { 0 },
        ru_width: if ru_size.is_some() { user.ru_width } else { 0 },
        ru_size,
        rate_kbps: 0,
    }
}

/// Build the indication for a completed PPDU. The hardware user count is
/// clamped to both the fixed capacity and the number of decoded user status
/// records; aggregates are summed over the users that remain.
pub fn build_indication(
    ppdu: &PpduInfo,
    directory: &dyn PeerDirectory,
    stats: &mut MonStats,
) -> PpduIndication {
    let rx = &ppdu.rx_status;
    let num_users = (ppdu.com.num_users as usize)
        .min(MAX_USERS)
        .min(ppdu.users.len());

    stats.reception_type[rx.reception.index()] += 1;
    if rx.reception == ReceptionType::MuOfdma
        && rx.frame_control_valid
        && fc::is_data(rx.frame_control)
    {
        stats.data_rx_ppdu += 1;
        stats.data_users[num_users] += 1;
    }

    let (peer_id, mac_addr, vdev_id) = match resolve_peer(directory, rx.ast_index) {
        Some(peer) => {
            let meta = peer.meta();
            (meta.peer_id, meta.mac_addr, meta.vdev_id)
        }
        None => (INVALID_PEER_ID, [0u8; 6], 0),
    };

    let mut users = Vec::with_capacity(num_users);
    let mut num_mpdu = 0u32;
    let mut num_msdu = 0u32;
    let mut num_bytes = 0u64;
    for user in &ppdu.users[..num_users] {
        let ind = populate_user(user, rx, directory, stats);
        num_mpdu += u32::from(ind.mpdu_cnt_fcs_ok);
        num_msdu += ind.tcp_msdu_count + ind.udp_msdu_count + ind.other_msdu_count;
        num_bytes += u64::from(ind.mpdu_ok_byte_count);
        users.push(ind);
    }

    PpduIndication {
        ppdu_id: ppdu.com.ppdu_id,
        peer_id,
        mac_addr,
        vdev_id,
        timestamp: rx.timestamp,
        duration: rx.duration,
        length: rx.ppdu_len,
        channel: rx.channel,
        rssi: rx.rssi_comb,
        noise_floor: rx.noise_floor,
        rx_status: rx.clone(),
        fcs_ok_cnt: ppdu.com.mpdu_cnt_fcs_ok,
        fcs_err_cnt: ppdu.com.mpdu_cnt_fcs_err,
        num_mpdu,
        num_msdu,
        num_bytes,
        num_users,
        users,
        cfr: ppdu.cfr.clone(),
        rx_rate_kbps: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ppdu_with_users, FakeDirectory};
    use crate::ppdu::AST_INDEX_INVALID;

    #[test]
    fn su_ppdu_uses_phy_status_for_rate_fields() {
        let dir = FakeDirectory::with_peer(3, 10, [1; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x100, &[3]);
        ppdu.rx_status.mcs = 7;
        ppdu.rx_status.nss = 2;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.num_users, 1);
        assert_eq!(ind.users[0].peer_id, 10);
        assert_eq!(ind.users[0].mcs, 7);
        assert_eq!(ind.users[0].nss, 2);
        assert_eq!(dir.outstanding(), 0);
    }

    #[test]
    fn claimed_user_count_is_clamped() {
        let dir = FakeDirectory::new();
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x200, &[AST_INDEX_INVALID, AST_INDEX_INVALID]);
        ppdu.com.num_users = 1000;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.num_users, 2);
    }

    #[test]
    fn unresolved_user_kept_with_invalid_peer_id() {
        let dir = FakeDirectory::with_peer(3, 10, [1; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x300, &[3, 99]);
        for user in &mut ppdu.users {
            user.mpdu_cnt_fcs_ok = 2;
            user.tcp_msdu_count = 1;
        }
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.users[1].peer_id, INVALID_PEER_ID);
        assert_eq!(stats.unresolved_peer, 1);
        // aggregates include the unresolved user
        assert_eq!(ind.num_mpdu, 4);
        assert_eq!(ind.num_msdu, 2);
    }

    #[test]
    fn bad_ru_size_skips_ru_fields_only() {
        let dir = FakeDirectory::with_peer(1, 10, [1; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x400, &[1]);
        ppdu.rx_status.reception = ReceptionType::MuOfdma;
        ppdu.users[0].mu_info_valid = true;
        ppdu.users[0].ru_size = 200;
        ppdu.users[0].mpdu_cnt_fcs_ok = 1;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(stats.invalid_ru_size, 1);
        assert!(ind.users[0].ru_size.is_none());
        assert_eq!(ind.num_mpdu, 1);
    }

    #[test]
    fn valid_ru_size_bumps_histogram() {
        let dir = FakeDirectory::with_peer(1, 10, [1; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x500, &[1]);
        ppdu.rx_status.reception = ReceptionType::MuOfdma;
        ppdu.rx_status.frame_control = 0x0008;
        ppdu.users[0].mu_info_valid = true;
        ppdu.users[0].ru_size = 3;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.users[0].ru_size, Some(RuSize::Ru242));
        assert_eq!(stats.data_rx_ru_size[RuSize::Ru242.index()], 1);
        assert_eq!(stats.nondata_rx_ru_size[RuSize::Ru242.index()], 0);
    }

    #[test]
    fn mu_ofdma_ru_fields_only_for_resolved_users() {
        // three OFDMA users; the middle one's AST index resolves nowhere
        let dir = FakeDirectory::with_peer(1, 10, [1; 6]).add_peer(3, 30, [3; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x600, &[1, 2, 3]);
        ppdu.rx_status.reception = ReceptionType::MuOfdma;
        ppdu.rx_status.frame_control = 0x0008;
        ppdu.rx_status.frame_control_valid = true;
        for (i, user) in ppdu.users.iter_mut().enumerate() {
            user.mu_info_valid = true;
            user.ru_size = i as u8;
            user.ru_start_index = 4;
            user.ru_width = 2;
            user.mpdu_cnt_fcs_ok = 1;
        }
        let ind = build_indication(&ppdu, &dir, &mut stats);

        assert_eq!(ind.users[0].ru_size, Some(RuSize::Ru26));
        assert!(ind.users[1].ru_size.is_none());
        assert_eq!(ind.users[1].ru_start_index, 0);
        assert_eq!(ind.users[1].ru_width, 0);
        assert_eq!(ind.users[2].ru_size, Some(RuSize::Ru106));
        assert_eq!(stats.unresolved_peer, 1);
        let ru_total: u32 = stats.data_rx_ru_size.iter().sum();
        assert_eq!(ru_total, 2);

        // classified as data, so the PPDU lands in the data histograms
        assert_eq!(stats.data_rx_ppdu, 1);
        assert_eq!(stats.data_users[3], 1);
        assert_eq!(dir.outstanding(), 0);
    }

    #[test]
    fn non_data_mu_ofdma_skips_data_ppdu_histograms() {
        let dir = FakeDirectory::with_peer(1, 10, [1; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x610, &[1]);
        ppdu.rx_status.reception = ReceptionType::MuOfdma;
        ppdu.rx_status.frame_control = 0x0080;
        ppdu.rx_status.frame_control_valid = true;
        ppdu.users[0].mu_info_valid = true;
        ppdu.users[0].ru_size = 0;
        build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(stats.data_rx_ppdu, 0);
        assert_eq!(stats.data_users[1], 0);
        assert_eq!(stats.nondata_rx_ru_size[RuSize::Ru26.index()], 1);
    }

    #[test]
    fn ppdu_level_peer_resolved_from_common_ast() {
        let dir = FakeDirectory::with_peer(7, 55, [9; 6]);
        let mut stats = MonStats::default();
        let mut ppdu = ppdu_with_users(0x700, &[7]);
        ppdu.rx_status.ast_index = 7;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.peer_id, 55);
        assert_eq!(ind.mac_addr, [9; 6]);

        // a failed common lookup marks the indication invalid but the user
        // records are still populated
        ppdu.rx_status.ast_index = 123;
        let ind = build_indication(&ppdu, &dir, &mut stats);
        assert_eq!(ind.peer_id, INVALID_PEER_ID);
        assert_eq!(ind.users.len(), 1);
        assert_eq!(ind.users[0].peer_id, 55);
        assert_eq!(dir.outstanding(), 0);
    }
}
