//! PHY rate derivation.
//!
//! Maps (preamble, bandwidth, guard interval, MCS, NSS) to a data rate in
//! kbps. Out-of-range MCS or zero NSS yields `None`; callers fall back to a
//! zero rate and skip average updates.

use crate::ppdu::{Bandwidth, GuardInterval, Preamble};

const LEGACY_A_KBPS: [u32; 8] = [6000, 9000, 12000, 18000, 24000, 36000, 48000, 54000];
const LEGACY_B_KBPS: [u32; 4] = [1000, 2000, 5500, 11000];

/// VHT single-stream rates at long guard interval, per bandwidth.
const VHT_LGI_KBPS: [[u32; 10]; 4] = [
    [6500, 13000, 19500, 26000, 39000, 52000, 58500, 65000, 78000, 86700],
    [13500, 27000, 40500, 54000, 81000, 108000, 121500, 135000, 162000, 180000],
    [29300, 58500, 87800, 117000, 175500, 234000, 263300, 292500, 351000, 390000],
    [58500, 117000, 175500, 234000, 351000, 468000, 526500, 585000, 702000, 780000],
];

/// HE single-stream rates at 0.8us guard interval, per bandwidth.
const HE_GI08_KBPS: [[u32; 12]; 4] = [
    [
        8600, 17200, 25800, 34400, 51600, 68800, 77400, 86000, 103200, 114700, 129000, 143400,
    ],
    [
        17200, 34400, 51600, 68800, 103200, 137600, 154900, 172100, 206500, 229400, 258100, 286800,
    ],
    [
        36000, 72100, 108100, 144100, 216200, 288200, 324300, 360300, 432400, 480400, 540400,
        600500,
    ],
    [
        72100, 144100, 216200, 288200, 432400, 576500, 648500, 720600, 864700, 960800, 1080900,
        1201000,
    ],
];

fn scale(kbps: u32, num: u32, den: u32) -> u32 {
    ((kbps as u64 * num as u64) / den as u64) as u32
}

/// Data rate in kbps for one user's reception parameters.
pub fn rate_kbps(
    preamble: Preamble,
    bw: Bandwidth,
    gi: GuardInterval,
    mcs: u8,
    nss: u8,
) -> Option<u32> {
    if nss == 0 || usize::from(mcs) >= preamble.max_mcs() {
        return None;
    }
    let mcs = usize::from(mcs);
    let nss = u32::from(nss);
    match preamble {
        Preamble::Dot11A => Some(LEGACY_A_KBPS[mcs]),
        Preamble::Dot11B => Some(LEGACY_B_KBPS[mcs]),
        Preamble::Dot11N | Preamble::Dot11Ac => {
            let base = VHT_LGI_KBPS[bw.index()][mcs] * nss;
            match gi {
                GuardInterval::Us0_4 => Some(scale(base, 10, 9)),
                _ => Some(base),
            }
        }
        Preamble::Dot11Ax => {
            // HE symbol is 13.6us of data; total symbol time grows with GI.
            let base = HE_GI08_KBPS[bw.index()][mcs] * nss;
            match gi {
                GuardInterval::Us1_6 => Some(scale(base, 144, 152)),
                GuardInterval::Us3_2 => Some(scale(base, 144, 168)),
                _ => Some(base),
            }
        }
    }
}
