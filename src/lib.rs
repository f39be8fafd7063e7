pub mod buffer;
pub mod config;
pub mod deliver;
pub mod errors;
pub mod events;
pub mod modes;
pub mod monitor;
pub mod peers;
pub mod ppdu;
pub mod ratetable;
pub mod stats;

#[cfg(test)]
pub mod test_utils;
