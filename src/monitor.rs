//! Receive-side monitor pipeline for one radio.
//!
//! `RxMonitor` consumes decoded status descriptors from the status ring and
//! restitched MPDU chains from the destination ring, drives the capture
//! modes, and publishes indications and captured frames on the event bus.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::buffer::{prepare_status_buffer, BufferAllocator, MonBuffer, MON_BUF_HEADROOM};
use crate::config::CaptureConfig;
use crate::deliver::{cbf_match, restitch_mpdu, HeaderWriter, MonitorSink, MAX_MONITOR_HEADER};
use crate::errors::{AllocError, DeliverError};
use crate::events::{EventBus, EventKind, EventPayload, MonEvent};
use crate::modes::{cfr, Dispatcher};
use crate::peers::PeerDirectory;
use crate::ppdu::{fc, MsduPayload, RxStatus, StatusDescriptor, TlvStatus, HW_RX_DESC_SIZE};
use crate::stats::mon_stats::MonStats;
use crate::stats::peer_stats::PeerStatsStore;

/// Length of the PPDU-id prefix pushed in front of captured management and
/// control frames.
const MGMT_PPDU_ID_PREFIX: usize = 4;

pub struct RxMonitor {
    radio_id: u8,
    directory: Arc<dyn PeerDirectory>,
    allocator: Arc<dyn BufferAllocator>,
    bus: EventBus,
    sink: Option<Arc<dyn MonitorSink>>,
    header: Box<dyn HeaderWriter>,
    dispatcher: Dispatcher,
    stats: MonStats,
    peer_stats: PeerStatsStore,
    /// PHY status of the most recently completed PPDU, used by the
    /// destination-ring delivery path.
    last_rx_status: RxStatus,
    ppdu_open: bool,
}

impl RxMonitor {
    pub fn new(
        radio_id: u8,
        directory: Arc<dyn PeerDirectory>,
        allocator: Arc<dyn BufferAllocator>,
        bus: EventBus,
        header: Box<dyn HeaderWriter>,
        cfg: CaptureConfig,
    ) -> Self {
        RxMonitor {
            radio_id,
            directory,
            allocator,
            bus,
            sink: None,
            header,
            dispatcher: Dispatcher::new(cfg),
            stats: MonStats::default(),
            peer_stats: PeerStatsStore::default(),
            last_rx_status: RxStatus::default(),
            ppdu_open: false,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MonitorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn radio_id(&self) -> u8 {
        self.radio_id
    }

    pub fn stats(&self) -> &MonStats {
        &self.stats
    }

    pub fn peer_stats(&self) -> &PeerStatsStore {
        &self.peer_stats
    }

    pub fn peer_stats_mut(&mut self) -> &mut PeerStatsStore {
        &mut self.peer_stats
    }

    pub fn active_config(&self) -> CaptureConfig {
        self.dispatcher.active()
    }

    /// Stage a capture configuration change. It takes effect at the next
    /// PPDU boundary, or immediately when no PPDU is in flight.
    pub fn set_capture_mode(&mut self, cfg: CaptureConfig) {
        self.dispatcher.request(cfg);
        if !self.ppdu_open {
            self.dispatcher.latch();
        }
    }

    /// Process one status-ring buffer. Returns the number of PPDUs completed
    /// by this buffer (0 or 1). The descriptor's buffer is consumed: either
    /// delivered through a capture path or freed here.
    pub fn process_ppdu_status(&mut self, desc: StatusDescriptor) -> u32 {
        let cfg = self.dispatcher.active();
        let StatusDescriptor {
            ppdu,
            completion,
            ppdu_start_seen,
            mpdu_ends,
            msdu_payloads,
            first_msdu_payload,
            buf,
        } = desc;
        let ppdu_id = ppdu.com.ppdu_id;

        if ppdu_start_seen {
            self.stats.tlv_ppdu_start(ppdu_id);
            self.ppdu_open = true;
        }

        // packet log gets its copy of the status buffer before any capture
        // path consumes it
        if cfg.pktlog_full
            && self.bus.publish(MonEvent {
                kind: EventKind::RxDesc,
                ppdu_id,
                payload: EventPayload::Buffer(buf.clone()),
            })
        {
            self.stats.pktlog_desc_events += 1;
        }

        if cfg.mcopy.enabled() {
            for end in &mpdu_ends {
                self.dispatcher.mcopy.on_mpdu_end(end);
            }
        }

        // status buffer disposition
        if cfg.smart_mesh && ppdu.rx_status.monitor_direct_used {
            match first_msdu_payload {
                Some(payload) => {
                    if let Err(dropped) = self.deliver_smart_mesh(&ppdu.rx_status, payload, buf) {
                        drop(dropped);
                    }
                }
                None => drop(buf),
            }
        } else if cfg.mcopy.enabled() {
            self.dispatcher.mcopy.process(
                cfg.mcopy,
                ppdu_id,
                ppdu.com.mpdu_cnt,
                &msdu_payloads,
                &buf,
                &self.bus,
                &mut self.stats,
            );
            drop(buf);
        } else {
            drop(buf);
        }

        match completion {
            TlvStatus::PpduNotDone => 0,
            TlvStatus::PpduDone => {
                self.stats.tlv_ppdu_end();
                self.stats.tlv_ppdu_done(ppdu_id);
                self.last_rx_status = ppdu.rx_status.clone();
                let handled = if cfg.enhanced_stats || cfg.mcopy.enabled() {
                    self.dispatcher.handle_ppdu_stats(
                        &ppdu,
                        &*self.directory,
                        &self.bus,
                        &mut self.stats,
                        &mut self.peer_stats,
                    )
                } else {
                    false
                };
                if cfg.cfr {
                    if handled {
                        cfr::update_cfr_dbg_stats(&mut self.stats, &ppdu);
                    } else {
                        cfr::handle_cfr(&ppdu, &*self.directory, &self.bus, &mut self.stats);
                    }
                }
                self.close_ppdu();
                1
            }
            TlvStatus::PpduNonStdDone => {
                self.stats.tlv_ppdu_end();
                self.stats.tlv_ppdu_done(ppdu_id);
                self.last_rx_status = ppdu.rx_status.clone();
                self.deliver_placeholder(&ppdu.rx_status);
                self.close_ppdu();
                1
            }
        }
    }

    fn close_ppdu(&mut self) {
        self.ppdu_open = false;
        self.dispatcher.latch();
    }

    /// Raw first-MSDU delivery to the monitor interface. On any failure the
    /// buffer comes back to the caller for freeing and the drop counter is
    /// bumped.
    fn deliver_smart_mesh(
        &mut self,
        rx: &RxStatus,
        payload: MsduPayload,
        mut buf: MonBuffer,
    ) -> Result<(), MonBuffer> {
        if buf.pull_head(payload.offset + 4).is_none() {
            self.stats.ppdu_drop_cnt += 1;
            return Err(buf);
        }
        buf.trim_to(payload.payload_len);
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => {
                self.stats.ppdu_drop_cnt += 1;
                return Err(buf);
            }
        };
        if self.header.attach(rx, &mut buf).is_err() {
            self.stats.ppdu_drop_cnt += 1;
            return Err(buf);
        }
        sink.deliver(buf);
        self.stats.smart_mesh_delivered += 1;
        Ok(())
    }

    /// Deliver an empty header-only frame for a PPDU whose preamble decoded
    /// but whose payload never did, so monitor captures show the reception
    /// happened.
    fn deliver_placeholder(&mut self, rx: &RxStatus) {
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => return,
        };
        let mut buf = MonBuffer::with_capacity(MAX_MONITOR_HEADER, MON_BUF_HEADROOM);
        if self.header.attach(rx, &mut buf).is_err() {
            self.stats.ppdu_drop_cnt += 1;
            return;
        }
        sink.deliver(buf);
        self.stats.non_std_delivered += 1;
        debug!("non-std ppdu {:#x} delivered as placeholder", rx.ppdu_id);
    }

    /// Deliver one destination-ring MPDU, given its MSDU fragment chain.
    /// Buffer ownership is settled here on every path.
    pub fn deliver_mpdu(&mut self, chain: Vec<MonBuffer>) -> Result<(), DeliverError> {
        let cfg = self.dispatcher.active();

        if cfg.pktlog_full {
            if let Some(first) = chain.first() {
                if first.len() >= HW_RX_DESC_SIZE
                    && self.bus.publish(MonEvent {
                        kind: EventKind::RxDesc,
                        ppdu_id: self.last_rx_status.ppdu_id,
                        payload: EventPayload::Buffer(MonBuffer::from_bytes(
                            &first.data()[..HW_RX_DESC_SIZE],
                        )),
                    })
                {
                    self.stats.pktlog_desc_events += 1;
                }
            }
        }

        let mpdu = match restitch_mpdu(chain) {
            Ok(mpdu) => mpdu,
            Err(err) => {
                self.stats.dest_mpdu_drop += 1;
                return Err(err);
            }
        };

        if cfg.pktlog_cbf && cbf_match(mpdu.data()) {
            if self.bus.publish(MonEvent {
                kind: EventKind::RxCbf,
                ppdu_id: self.last_rx_status.ppdu_id,
                payload: EventPayload::Buffer(mpdu.clone()),
            }) {
                self.stats.cfr.cbf_delivered += 1;
            }
        }

        let fc_word = mpdu.data().first().copied().map(u16::from).unwrap_or(0);
        if cfg.mcopy.enabled() && (fc::is_mgmt(fc_word) || fc::is_ctrl(fc_word)) {
            return self.send_mgmt_to_stack(mpdu);
        }

        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => {
                self.stats.dest_mpdu_drop += 1;
                return Err(DeliverError::NoConsumer);
            }
        };
        let mut mpdu = mpdu;
        if let Err(err) = self.header.attach(&self.last_rx_status, &mut mpdu) {
            self.stats.dest_mpdu_drop += 1;
            return Err(err);
        }
        sink.deliver(mpdu);
        self.stats.dest_mpdu_done += 1;
        Ok(())
    }

    /// Hand a captured management or control frame upward with the PPDU id
    /// of its reception stamped in front.
    fn send_mgmt_to_stack(&mut self, mut buf: MonBuffer) -> Result<(), DeliverError> {
        let ppdu_id = self.last_rx_status.ppdu_id;
        match buf.push_head(MGMT_PPDU_ID_PREFIX) {
            Some(head) => LittleEndian::write_u32(head, ppdu_id),
            None => {
                self.stats.dest_mpdu_drop += 1;
                return Err(DeliverError::NoHeadroom);
            }
        }
        if self.bus.publish(MonEvent {
            kind: EventKind::RxMgmtCtrl,
            ppdu_id,
            payload: EventPayload::Buffer(buf),
        }) {
            self.stats.mgmt_ctrl_events += 1;
        }
        Ok(())
    }

    /// Allocate and map a replacement status-ring buffer.
    pub fn replenish_status_buffer(&mut self) -> Result<MonBuffer, AllocError> {
        prepare_status_buffer(
            &*self.allocator,
            &mut self.stats.status_buf_alloc_fail,
            &mut self.stats.status_buf_map_fail,
        )
        .map_err(|err| {
            self.stats.status_replenish_fail += 1;
            err
        })
    }
}
