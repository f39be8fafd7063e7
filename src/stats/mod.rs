//! Statistics: monitor-path counters, per-PPDU indications, per-peer
//! receive stats.

pub mod indication;
pub mod mon_stats;
pub mod peer_stats;
