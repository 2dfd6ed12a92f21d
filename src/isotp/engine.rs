//! A software ISO-TP (classical, non-FD) engine: single/first/consecutive
//! frame segmentation and flow control, driven entirely through injected
//! `rxfn`/`txfn` callbacks rather than owning a bus itself.
//!
//! One background worker thread pumps `rxfn`, reassembling inbound frames
//! and answering any in-flight outbound transfer's wait for flow control;
//! `send` runs on the caller's thread and blocks for that reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::CanError;
use crate::isotp::{IsotpParams, IsotpTransport};

const PCI_SINGLE: u8 = 0x0;
const PCI_FIRST: u8 = 0x1;
const PCI_CONSECUTIVE: u8 = 0x2;
const PCI_FLOW_CONTROL: u8 = 0x3;

const FC_CONTINUE: u8 = 0;
const FC_WAIT: u8 = 1;
const FC_OVERFLOW: u8 = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub type RxFn = Box<dyn Fn(Duration) -> Option<Vec<u8>> + Send>;
pub type TxFn = Box<dyn Fn(&[u8]) + Send + Sync>;

struct FlowControl {
    status: u8,
    block_size: u8,
}

struct Reassembly {
    buf: Vec<u8>,
    expected_len: usize,
    next_seq: u8,
}

struct Shared {
    running: AtomicBool,
    complete_tx: Sender<Vec<u8>>,
    complete_rx: Mutex<Receiver<Vec<u8>>>,
    fc_waiter: Mutex<Option<Sender<FlowControl>>>,
}

pub struct SoftwareIsotp {
    rxfn: Mutex<Option<RxFn>>,
    txfn: Arc<TxFn>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    params: IsotpParams,
}

impl SoftwareIsotp {
    pub fn new(rxfn: RxFn, txfn: TxFn, params: IsotpParams) -> Self {
        let (complete_tx, complete_rx) = mpsc::channel();
        Self {
            rxfn: Mutex::new(Some(rxfn)),
            txfn: Arc::new(txfn),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                complete_tx,
                complete_rx: Mutex::new(complete_rx),
                fc_waiter: Mutex::new(None),
            }),
            worker: Mutex::new(None),
            params,
        }
    }

    fn recv_worker(rxfn: RxFn, shared: Arc<Shared>, txfn: Arc<TxFn>, params: IsotpParams) {
        let mut reassembly: Option<Reassembly> = None;
        while shared.running.load(Ordering::SeqCst) {
            let Some(frame) = rxfn(POLL_INTERVAL) else {
                continue;
            };
            let Some(&pci_byte) = frame.first() else {
                continue;
            };
            match pci_byte >> 4 {
                PCI_SINGLE => {
                    let len = (pci_byte & 0x0F) as usize;
                    if frame.len() >= 1 + len {
                        let _ = shared.complete_tx.send(frame[1..1 + len].to_vec());
                    }
                    reassembly = None;
                }
                PCI_FIRST => {
                    if frame.len() < 2 {
                        continue;
                    }
                    let len = (((pci_byte & 0x0F) as usize) << 8) | frame[1] as usize;
                    let mut buf = Vec::with_capacity(len);
                    buf.extend_from_slice(&frame[2..frame.len().min(8)]);
                    reassembly = Some(Reassembly {
                        buf,
                        expected_len: len,
                        next_seq: 1,
                    });
                    let stmin_byte = params.stmin.as_millis().min(127) as u8;
                    txfn(&[PCI_FLOW_CONTROL << 4 | FC_CONTINUE, 0, stmin_byte]);
                }
                PCI_CONSECUTIVE => {
                    if let Some(r) = reassembly.as_mut() {
                        let seq = pci_byte & 0x0F;
                        if seq != r.next_seq {
                            reassembly = None;
                            continue;
                        }
                        let remaining = r.expected_len.saturating_sub(r.buf.len());
                        let take = remaining.min(frame.len().saturating_sub(1));
                        r.buf.extend_from_slice(&frame[1..1 + take]);
                        r.next_seq = (r.next_seq + 1) % 16;
                        if r.buf.len() >= r.expected_len {
                            let complete = std::mem::take(&mut r.buf);
                            let _ = shared.complete_tx.send(complete);
                            reassembly = None;
                        }
                    }
                }
                PCI_FLOW_CONTROL => {
                    if frame.len() >= 2 {
                        let fc = FlowControl {
                            status: pci_byte & 0x0F,
                            block_size: frame[1],
                        };
                        if let Some(sender) = shared.fc_waiter.lock().unwrap().take() {
                            let _ = sender.send(fc);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl IsotpTransport for SoftwareIsotp {
    fn start(&mut self) {
        let rxfn = self
            .rxfn
            .lock()
            .unwrap()
            .take()
            .expect("SoftwareIsotp::start called more than once");
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let txfn = self.txfn.clone();
        let params = self.params;
        let handle = thread::spawn(move || Self::recv_worker(rxfn, shared, txfn, params));
        *self.worker.lock().unwrap() = Some(handle);
    }

    fn send(&self, data: &[u8]) -> Result<(), CanError> {
        if data.len() <= 7 {
            let mut frame = Vec::with_capacity(1 + data.len());
            frame.push(PCI_SINGLE << 4 | data.len() as u8);
            frame.extend_from_slice(data);
            (self.txfn)(&frame);
            return Ok(());
        }

        let len = data.len() as u16;
        let mut first_frame = Vec::with_capacity(8);
        first_frame.push(PCI_FIRST << 4 | ((len >> 8) as u8 & 0x0F));
        first_frame.push((len & 0xFF) as u8);
        first_frame.extend_from_slice(&data[..6]);

        let (fc_tx, mut fc_rx) = mpsc::channel();
        *self.shared.fc_waiter.lock().unwrap() = Some(fc_tx);
        (self.txfn)(&first_frame);

        let mut offset = 6usize;
        let mut seq: u8 = 1;
        loop {
            let fc = fc_rx
                .recv_timeout(self.params.rx_flowcontrol_timeout)
                .map_err(|_| CanError::FlowControlTimeout(self.params.rx_flowcontrol_timeout))?;
            match fc.status {
                FC_OVERFLOW => {
                    return Err(CanError::ReassemblyOverflow {
                        max: crate::packet::MAX_PACKET_LEN,
                    })
                }
                FC_WAIT => continue,
                _ => {}
            }

            // BlockSize=0 means "send every remaining consecutive frame with
            // no further flow control"; any other value caps how many CFs
            // this side sends before waiting on another FC frame.
            let unlimited_block = fc.block_size == 0;
            let mut sent_in_block = 0u8;
            while offset < data.len() && (unlimited_block || sent_in_block < fc.block_size) {
                let end = (offset + 7).min(data.len());
                let mut cf = Vec::with_capacity(1 + (end - offset));
                cf.push(PCI_CONSECUTIVE << 4 | (seq & 0x0F));
                cf.extend_from_slice(&data[offset..end]);
                (self.txfn)(&cf);
                offset = end;
                seq = (seq + 1) % 16;
                sent_in_block += 1;
                if offset < data.len() {
                    thread::sleep(self.params.stmin);
                }
            }

            if offset >= data.len() {
                return Ok(());
            }

            let (next_fc_tx, next_fc_rx) = mpsc::channel();
            *self.shared.fc_waiter.lock().unwrap() = Some(next_fc_tx);
            fc_rx = next_fc_rx;
        }
    }

    fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.shared.complete_rx.lock().unwrap().recv_timeout(timeout).ok()
    }
}

impl Drop for SoftwareIsotp {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
