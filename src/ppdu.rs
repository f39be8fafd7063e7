//! PPDU status data model.
//!
//! These types describe what the HAL has already decoded from the hardware
//! status ring: one `StatusDescriptor` per status buffer, carrying the
//! accumulated `PpduInfo` for the PPDU in flight. The exact binary layout of
//! the hardware descriptor is owned by the HAL; this crate only consumes the
//! decoded form.

use serde::{Deserialize, Serialize};

use crate::buffer::MonBuffer;

/// Fixed per-PPDU user capacity. A descriptor claiming more users is clamped.
pub const MAX_USERS: usize = 37;

/// Sentinel AST index reported by hardware when no address match was found.
pub const AST_INDEX_INVALID: u32 = 0xffff_ffff;

/// TID value meaning "no QoS TID present".
pub const TID_INVALID: u8 = 0xff;

/// WME access categories: BE, BK, VI, VO.
pub const NUM_WME_AC: usize = 4;

/// Map a QoS TID to its WME access category. TIDs outside the QoS range
/// (including [`TID_INVALID`]) have no category.
pub fn tid_to_wme_ac(tid: u8) -> Option<usize> {
    match tid {
        0 | 3 => Some(0),
        1 | 2 => Some(1),
        4 | 5 => Some(2),
        6 | 7 => Some(3),
        _ => None,
    }
}

/// Hardware receive descriptor bytes prefixed to every destination-ring MSDU.
pub const HW_RX_DESC_SIZE: usize = 32;

/// How one PPDU was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceptionType {
    Su,
    MuMimo,
    MuOfdma,
}

pub const NUM_RECEPTION_TYPES: usize = 3;

impl ReceptionType {
    pub fn index(self) -> usize {
        match self {
            ReceptionType::Su => 0,
            ReceptionType::MuMimo => 1,
            ReceptionType::MuOfdma => 2,
        }
    }

    pub fn is_mu(self) -> bool {
        !matches!(self, ReceptionType::Su)
    }
}

/// Preamble / PHY generation class of a reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preamble {
    Dot11A,
    Dot11B,
    Dot11N,
    Dot11Ac,
    Dot11Ax,
}

pub const NUM_PREAMBLES: usize = 5;

impl Preamble {
    pub fn index(self) -> usize {
        match self {
            Preamble::Dot11A => 0,
            Preamble::Dot11B => 1,
            Preamble::Dot11N => 2,
            Preamble::Dot11Ac => 3,
            Preamble::Dot11Ax => 4,
        }
    }

    /// Highest valid MCS index (exclusive) for this preamble class.
    pub fn max_mcs(self) -> usize {
        match self {
            Preamble::Dot11A => 8,
            Preamble::Dot11B => 4,
            Preamble::Dot11N => 8,
            Preamble::Dot11Ac => 10,
            Preamble::Dot11Ax => 12,
        }
    }
}

/// Channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bandwidth {
    Bw20,
    Bw40,
    Bw80,
    Bw160,
}

pub const NUM_BANDWIDTHS: usize = 4;

impl Bandwidth {
    /// Construct a `Bandwidth` from its numeric MHz value.
    pub fn new(mhz: u16) -> Option<Self> {
        match mhz {
            20 => Some(Bandwidth::Bw20),
            40 => Some(Bandwidth::Bw40),
            80 => Some(Bandwidth::Bw80),
            160 => Some(Bandwidth::Bw160),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Bandwidth::Bw20 => 0,
            Bandwidth::Bw40 => 1,
            Bandwidth::Bw80 => 2,
            Bandwidth::Bw160 => 3,
        }
    }

    /// SNR gain offset in dB applied when folding RSSI into peer stats.
    pub fn gain_offset_db(self) -> i32 {
        match self {
            Bandwidth::Bw20 => 0,
            Bandwidth::Bw40 => 3,
            Bandwidth::Bw80 => 6,
            Bandwidth::Bw160 => 9,
        }
    }
}

/// Guard interval of a reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardInterval {
    Us0_8,
    Us0_4,
    Us1_6,
    Us3_2,
}

pub const NUM_GI: usize = 4;

impl GuardInterval {
    pub fn index(self) -> usize {
        match self {
            GuardInterval::Us0_8 => 0,
            GuardInterval::Us0_4 => 1,
            GuardInterval::Us1_6 => 2,
            GuardInterval::Us3_2 => 3,
        }
    }
}

/// OFDMA resource-unit size, validated before use as a table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuSize {
    Ru26,
    Ru52,
    Ru106,
    Ru242,
    Ru484,
    Ru996,
    Ru996x2,
}

pub const NUM_RU_SIZES: usize = 7;

impl RuSize {
    /// Construct from the raw hardware encoding; out-of-range values are
    /// rejected rather than clamped.
    pub fn new(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(RuSize::Ru26),
            1 => Some(RuSize::Ru52),
            2 => Some(RuSize::Ru106),
            3 => Some(RuSize::Ru242),
            4 => Some(RuSize::Ru484),
            5 => Some(RuSize::Ru996),
            6 => Some(RuSize::Ru996x2),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// 802.11 frame-control helpers. The frame control word is kept raw in the
/// descriptors; only the handful of bits this pipeline cares about are
/// decoded here.
pub mod fc {
    pub const TYPE_MASK: u8 = 0x0c;
    pub const TYPE_MGT: u8 = 0x00;
    pub const TYPE_CTL: u8 = 0x04;
    pub const TYPE_DATA: u8 = 0x08;
    pub const SUBTYPE_MASK: u8 = 0xf0;
    pub const SUBTYPE_ACTION_NO_ACK: u8 = 0xe0;

    const RETRY_BIT: u16 = 0x0800;

    /// First frame-control octet (type/subtype) of a little-endian FC word.
    pub fn fc0(frame_control: u16) -> u8 {
        (frame_control & 0xff) as u8
    }

    pub fn is_data(frame_control: u16) -> bool {
        fc0(frame_control) & TYPE_MASK == TYPE_DATA
    }

    pub fn is_mgmt(frame_control: u16) -> bool {
        fc0(frame_control) & TYPE_MASK == TYPE_MGT
    }

    pub fn is_ctrl(frame_control: u16) -> bool {
        fc0(frame_control) & TYPE_MASK == TYPE_CTL
    }

    pub fn is_retry_set(frame_control: u16) -> bool {
        frame_control & RETRY_BIT != 0
    }

    /// Management action-no-ack match on a raw first octet, as used by the
    /// CBF packet log.
    pub fn is_action_no_ack(b0: u8) -> bool {
        b0 & TYPE_MASK == TYPE_MGT && b0 & SUBTYPE_MASK == SUBTYPE_ACTION_NO_ACK
    }
}

/// PPDU-wide PHY receive status.
#[derive(Debug, Clone)]
pub struct RxStatus {
    pub ppdu_id: u32,
    pub timestamp: u64,
    pub duration: u32,
    pub ppdu_len: u32,
    pub channel: u16,
    pub noise_floor: i16,
    pub rssi_comb: i8,
    pub bw: Bandwidth,
    pub mcs: u8,
    pub nss: u8,
    pub gi: GuardInterval,
    pub preamble: Preamble,
    pub reception: ReceptionType,
    pub ldpc: bool,
    pub stbc: bool,
    pub dcm: bool,
    pub beamformed: bool,
    pub tid: u8,
    pub frame_control: u16,
    pub frame_control_valid: bool,
    pub first_data_seq_ctrl: u16,
    pub ast_index: u32,
    pub tcp_msdu_count: u32,
    pub udp_msdu_count: u32,
    pub other_msdu_count: u32,
    /// Hardware routed this PPDU's payload directly to the monitor status
    /// ring (smart-mesh path).
    pub monitor_direct_used: bool,
}

impl Default for RxStatus {
    fn default() -> Self {
        RxStatus {
            ppdu_id: 0,
            timestamp: 0,
            duration: 0,
            ppdu_len: 0,
            channel: 0,
            noise_floor: 0,
            rssi_comb: 0,
            bw: Bandwidth::Bw20,
            mcs: 0,
            nss: 1,
            gi: GuardInterval::Us0_8,
            preamble: Preamble::Dot11A,
            reception: ReceptionType::Su,
            ldpc: false,
            stbc: false,
            dcm: false,
            beamformed: false,
            tid: TID_INVALID,
            frame_control: 0,
            frame_control_valid: false,
            first_data_seq_ctrl: 0,
            ast_index: AST_INDEX_INVALID,
            tcp_msdu_count: 0,
            udp_msdu_count: 0,
            other_msdu_count: 0,
            monitor_direct_used: false,
        }
    }
}

/// Per-user receive status within one PPDU.
#[derive(Debug, Clone, Default)]
pub struct UserStatus {
    pub ast_index: u32,
    pub mcs: u8,
    pub nss: u8,
    pub tid: u8,
    pub frame_control: u16,
    pub frame_control_valid: bool,
    pub qos_control: u16,
    pub qos_control_valid: bool,
    pub first_data_seq_ctrl: u16,
    pub tcp_msdu_count: u32,
    pub udp_msdu_count: u32,
    pub other_msdu_count: u32,
    pub mpdu_cnt_fcs_ok: u16,
    pub mpdu_cnt_fcs_err: u16,
    pub mpdu_ok_byte_count: u32,
    pub mpdu_err_byte_count: u32,
    /// Uplink MU info (NSS/MCS/RU fields) decoded successfully.
    pub mu_info_valid: bool,
    pub ru_size: u8,
    pub ru_start_index: u8,
    pub ru_width: u8,
}

/// Common (non-PHY) PPDU accounting.
#[derive(Debug, Clone, Default)]
pub struct ComInfo {
    pub ppdu_id: u32,
    /// Users claimed by hardware; may exceed [`MAX_USERS`] on adversarial
    /// input and is clamped everywhere it is used.
    pub num_users: u32,
    /// MPDU headers seen in the current status buffer.
    pub mpdu_cnt: u16,
    pub mpdu_cnt_fcs_ok: u16,
    pub mpdu_cnt_fcs_err: u16,
}

/// Channel-frequency-response capture state for one PPDU.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CfrSnapshot {
    pub bb_captured_channel: bool,
    pub bb_captured_timeout: bool,
    pub bb_captured_reason: u8,
    pub rx_location_info_valid: bool,
    pub chan_capture_status: u8,
    pub rtt_che_buffer_pointer_high8: u8,
    pub rtt_che_buffer_pointer_low32: u32,
    pub rtt_cfo_measurement: i16,
    pub agc_gain_info: [u32; 4],
    pub rx_start_ts: u64,
}

/// Accumulated state of the PPDU currently in flight, as decoded by the HAL.
#[derive(Debug, Clone, Default)]
pub struct PpduInfo {
    pub com: ComInfo,
    pub rx_status: RxStatus,
    pub users: Vec<UserStatus>,
    pub cfr: CfrSnapshot,
}

/// Location of an MSDU payload inside a status buffer.
#[derive(Debug, Clone, Copy)]
pub struct MsduPayload {
    /// Byte offset of the payload marker word; the 802.11 frame starts four
    /// bytes beyond it.
    pub offset: usize,
    pub payload_len: usize,
}

/// One MPDU-end marker decoded from a status buffer, with the number of MPDU
/// headers that had been seen in that buffer when the marker arrived. A
/// count of zero means the matching header lives in the previous buffer.
#[derive(Debug, Clone, Copy)]
pub struct MpduEnd {
    pub fcs_ok: bool,
    pub mpdu_cnt_so_far: u16,
}

/// Completion state reported at the end of one status buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvStatus {
    /// More status buffers belong to this PPDU.
    PpduNotDone,
    /// PPDU fully described; indications may be produced.
    PpduDone,
    /// Preamble-only PPDU with no decodable MPDU.
    PpduNonStdDone,
}

/// One hardware status buffer's worth of decoded receive state.
#[derive(Debug)]
pub struct StatusDescriptor {
    pub ppdu: PpduInfo,
    pub completion: TlvStatus,
    pub ppdu_start_seen: bool,
    pub mpdu_ends: Vec<MpduEnd>,
    /// Payload locations for FCS-passing MPDUs, in order (m-copy).
    pub msdu_payloads: Vec<MsduPayload>,
    /// First MSDU payload location (smart-mesh).
    pub first_msdu_payload: Option<MsduPayload>,
    pub buf: MonBuffer,
}
