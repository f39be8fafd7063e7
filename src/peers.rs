//! Peer resolution against the driver's AST table.
//!
//! Lookups are reference counted: a successful `acquire` must be balanced by
//! exactly one `release`. `PeerRef` enforces the balance as a drop guard so
//! early returns in the processing paths cannot leak a reference.

use crate::ppdu::AST_INDEX_INVALID;

pub type PeerId = u16;

/// Sentinel peer id meaning "no peer matched".
pub const INVALID_PEER_ID: PeerId = 0xffff;

/// Immutable peer identity, snapshotted at acquire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMeta {
    pub peer_id: PeerId,
    pub mac_addr: [u8; 6],
    pub vdev_id: u8,
    /// Peer is the BSS (self) peer; its traffic is not attributed.
    pub is_bss: bool,
}

/// Peer table the monitor path resolves AST indices against. Implemented by
/// the driver core; tests use a fixed map.
pub trait PeerDirectory: Send + Sync {
    /// Resolve an AST index to a peer and take a reference on it.
    fn acquire(&self, ast_index: u32) -> Option<PeerMeta>;

    /// Drop a reference taken by [`acquire`](Self::acquire).
    fn release(&self, peer_id: PeerId);
}

/// Drop guard holding one directory reference.
pub struct PeerRef<'a> {
    directory: &'a dyn PeerDirectory,
    meta: PeerMeta,
}

impl<'a> PeerRef<'a> {
    pub fn meta(&self) -> &PeerMeta {
        &self.meta
    }

    pub fn peer_id(&self) -> PeerId {
        self.meta.peer_id
    }
}

impl Drop for PeerRef<'_> {
    fn drop(&mut self) {
        self.directory.release(self.meta.peer_id);
    }
}

/// Resolve an AST index, skipping the invalid sentinel without touching the
/// directory.
pub fn resolve_peer(directory: &dyn PeerDirectory, ast_index: u32) -> Option<PeerRef<'_>> {
    if ast_index == AST_INDEX_INVALID {
        return None;
    }
    let meta = directory.acquire(ast_index)?;
    Some(PeerRef { directory, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeDirectory;

    #[test]
    fn invalid_ast_index_skips_directory() {
        let dir = FakeDirectory::new();
        assert!(resolve_peer(&dir, AST_INDEX_INVALID).is_none());
        assert_eq!(dir.outstanding(), 0);
    }

    #[test]
    fn reference_released_on_drop() {
        let dir = FakeDirectory::with_peer(7, 42, [0xaa; 6]);
        {
            let peer = resolve_peer(&dir, 7).unwrap();
            assert_eq!(peer.peer_id(), 42);
            assert_eq!(dir.outstanding(), 1);
        }
        assert_eq!(dir.outstanding(), 0);
    }

    #[test]
    fn unknown_ast_index_resolves_to_none() {
        let dir = FakeDirectory::with_peer(7, 42, [0xaa; 6]);
        assert!(resolve_peer(&dir, 8).is_none());
        assert_eq!(dir.outstanding(), 0);
    }
}
