//! Monitor delivery: MPDU restitching, the monitor header seam, and the CBF
//! packet-log match.

use crate::buffer::MonBuffer;
use crate::errors::DeliverError;
use crate::ppdu::{fc, RxStatus, HW_RX_DESC_SIZE};

/// Worst-case monitor header size; also the size of placeholder frames
/// emitted for non-standard PPDUs.
pub const MAX_MONITOR_HEADER: usize = 512;

/// Trailing frame check sequence stripped before delivery.
pub const FCS_LEN: usize = 4;

/// Consumer of fully assembled monitor frames (the monitor interface).
pub trait MonitorSink: Send + Sync {
    fn deliver(&self, buf: MonBuffer);
}

/// Writes the capture metadata header into a frame's headroom. Kept behind a
/// trait so the wire format stays out of the pipeline and tests can force
/// attach failures.
#[cfg_attr(test, mockall::automock)]
pub trait HeaderWriter: Send + Sync {
    fn attach(&self, rx: &RxStatus, buf: &mut MonBuffer) -> Result<(), DeliverError>;
}

/// Reassemble one MPDU from its destination-ring MSDU fragments. Each
/// fragment carries a hardware descriptor prefix that is stripped; the FCS is
/// trimmed from the assembled frame. The chain is consumed on both paths.
pub fn restitch_mpdu(chain: Vec<MonBuffer>) -> Result<MonBuffer, DeliverError> {
    let mut frags = chain.into_iter();
    let mut mpdu = frags.next().ok_or(DeliverError::Restitch("empty chain"))?;
    if mpdu.pull_head(HW_RX_DESC_SIZE).is_none() {
        return Err(DeliverError::Restitch("fragment shorter than rx descriptor"));
    }
    for mut frag in frags {
        if frag.pull_head(HW_RX_DESC_SIZE).is_none() {
            return Err(DeliverError::Restitch("fragment shorter than rx descriptor"));
        }
        mpdu.put_tail(frag.data());
    }
    if mpdu.len() < FCS_LEN {
        return Err(DeliverError::Restitch("frame shorter than fcs"));
    }
    let trimmed = mpdu.len() - FCS_LEN;
    mpdu.trim_to(trimmed);
    Ok(mpdu)
}

/// Compressed-beamforming-report match: management action-no-ack frame.
pub fn cbf_match(frame: &[u8]) -> bool {
    frame.first().is_some_and(|&b0| fc::is_action_no_ack(b0))
}
