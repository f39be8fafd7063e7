//! Shared test fixtures: fake peer directory, scripted allocator, collecting
//! sink, and descriptor builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicIsize, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::{BufferAllocator, MonBuffer, MON_BUF_HEADROOM, STATUS_BUF_SIZE};
use crate::deliver::{HeaderWriter, MonitorSink};
use crate::errors::{AllocError, DeliverError};
use crate::peers::{PeerDirectory, PeerId, PeerMeta};
use crate::ppdu::{
    PpduInfo, RxStatus, StatusDescriptor, TlvStatus, UserStatus, AST_INDEX_INVALID,
    HW_RX_DESC_SIZE,
};

/// Fixed-map peer directory tracking outstanding references.
#[derive(Default)]
pub struct FakeDirectory {
    peers: HashMap<u32, PeerMeta>,
    outstanding: AtomicIsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        FakeDirectory::default()
    }

    pub fn with_peer(ast_index: u32, peer_id: PeerId, mac_addr: [u8; 6]) -> Self {
        let mut peers = HashMap::new();
        peers.insert(
            ast_index,
            PeerMeta {
                peer_id,
                mac_addr,
                vdev_id: 0,
                is_bss: false,
            },
        );
        FakeDirectory {
            peers,
            outstanding: AtomicIsize::new(0),
        }
    }

    pub fn add_peer(mut self, ast_index: u32, peer_id: PeerId, mac_addr: [u8; 6]) -> Self {
        self.peers.insert(
            ast_index,
            PeerMeta {
                peer_id,
                mac_addr,
                vdev_id: 0,
                is_bss: false,
            },
        );
        self
    }

    /// References acquired but not yet released.
    pub fn outstanding(&self) -> isize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl PeerDirectory for FakeDirectory {
    fn acquire(&self, ast_index: u32) -> Option<PeerMeta> {
        let meta = self.peers.get(&ast_index)?.clone();
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Some(meta)
    }

    fn release(&self, _peer_id: PeerId) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Allocator with scripted transient failures and a live-buffer count.
#[derive(Default)]
pub struct CountingAllocator {
    alloc_fails_left: AtomicU32,
    map_fails_left: AtomicU32,
    live: Arc<AtomicIsize>,
}

impl CountingAllocator {
    /// Fail the first `n` allocations. `u32::MAX` fails forever.
    pub fn failing_allocs(n: u32) -> Self {
        CountingAllocator {
            alloc_fails_left: AtomicU32::new(n),
            ..CountingAllocator::default()
        }
    }

    /// Fail the first `n` mappings.
    pub fn failing_maps(n: u32) -> Self {
        CountingAllocator {
            map_fails_left: AtomicU32::new(n),
            ..CountingAllocator::default()
        }
    }

    /// Buffers allocated here that are still alive.
    pub fn live(&self) -> isize {
        self.live.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        let left = counter.load(Ordering::SeqCst);
        if left == 0 {
            return false;
        }
        if left != u32::MAX {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
        true
    }
}

impl BufferAllocator for CountingAllocator {
    fn alloc(&self) -> Result<MonBuffer, AllocError> {
        if Self::take_failure(&self.alloc_fails_left) {
            return Err(AllocError::AllocFailed);
        }
        Ok(MonBuffer::with_capacity(STATUS_BUF_SIZE, MON_BUF_HEADROOM)
            .with_token(self.live.clone()))
    }

    fn map(&self, buf: &mut MonBuffer) -> Result<(), AllocError> {
        if Self::take_failure(&self.map_fails_left) {
            return Err(AllocError::MapFailed);
        }
        buf.set_mapped(true);
        Ok(())
    }

    fn unmap(&self, buf: &mut MonBuffer) {
        buf.set_mapped(false);
    }
}

/// Sink that keeps everything delivered to it.
#[derive(Default)]
pub struct CollectSink {
    delivered: Mutex<Vec<MonBuffer>>,
}

impl CollectSink {
    pub fn take(&self) -> Vec<MonBuffer> {
        match self.delivered.lock() {
            Ok(mut delivered) => std::mem::take(&mut *delivered),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl MonitorSink for CollectSink {
    fn deliver(&self, buf: MonBuffer) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(buf);
        }
    }
}

/// Length of the header [`FixedHeader`] attaches.
pub const HEADER_LEN: usize = 8;

/// Deterministic 8-byte header: magic plus the PPDU id.
pub struct FixedHeader;

impl HeaderWriter for FixedHeader {
    fn attach(&self, rx: &RxStatus, buf: &mut MonBuffer) -> Result<(), DeliverError> {
        let head = buf.push_head(HEADER_LEN).ok_or(DeliverError::NoHeadroom)?;
        head[..4].copy_from_slice(b"MON0");
        LittleEndian::write_u32(&mut head[4..], rx.ppdu_id);
        Ok(())
    }
}

/// A destination-ring MSDU fragment: hardware descriptor prefix plus frame
/// bytes.
pub fn msdu_fragment(frame: &[u8]) -> MonBuffer {
    let mut bytes = vec![0u8; HW_RX_DESC_SIZE];
    bytes.extend_from_slice(frame);
    MonBuffer::from_bytes(&bytes)
}

/// A PPDU with one user status record per AST index.
pub fn ppdu_with_users(ppdu_id: u32, ast_indices: &[u32]) -> PpduInfo {
    let mut ppdu = PpduInfo::default();
    ppdu.com.ppdu_id = ppdu_id;
    ppdu.com.num_users = ast_indices.len() as u32;
    ppdu.rx_status.ppdu_id = ppdu_id;
    ppdu.users = ast_indices
        .iter()
        .map(|&ast_index| UserStatus {
            ast_index,
            ..UserStatus::default()
        })
        .collect();
    ppdu
}

/// A status descriptor for a well-formed data PPDU: valid frame control,
/// one FCS-passing MPDU per user.
pub fn status_desc(
    ppdu_id: u32,
    ast_indices: &[u32],
    completion: TlvStatus,
    ppdu_start_seen: bool,
) -> StatusDescriptor {
    let mut ppdu = ppdu_with_users(ppdu_id, ast_indices);
    ppdu.com.mpdu_cnt = ast_indices.len() as u16;
    ppdu.com.mpdu_cnt_fcs_ok = ast_indices.len().max(1) as u16;
    ppdu.rx_status.frame_control = 0x0008;
    ppdu.rx_status.frame_control_valid = true;
    ppdu.rx_status.ast_index = ast_indices.first().copied().unwrap_or(AST_INDEX_INVALID);
    for user in &mut ppdu.users {
        user.mpdu_cnt_fcs_ok = 1;
        user.tcp_msdu_count = 1;
        user.mpdu_ok_byte_count = 256;
    }
    StatusDescriptor {
        ppdu,
        completion,
        ppdu_start_seen,
        mpdu_ends: Vec::new(),
        msdu_payloads: Vec::new(),
        first_msdu_payload: None,
        buf: MonBuffer::from_bytes(&[0u8; 64]),
    }
}
