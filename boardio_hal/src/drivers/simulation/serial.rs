//! Simulated serial ports.
//!
//! Each port has a receive buffer fed by `inject` (or by its own writes
//! when in loopback) and at most one active reader.

use boardio_common::hal::config::BoardConfig;
use boardio_common::hal::consts::DEFAULT_BAUD;
use boardio_common::hal::driver::IoError;
use boardio_common::hal::ident::{NameTable, PortId};
use boardio_common::hal::types::{BytesHandler, SubscriptionId};
use std::collections::VecDeque;
use tracing::{debug, trace};

struct Reader {
    id: SubscriptionId,
    max_bytes: Option<usize>,
    handler: BytesHandler,
}

#[derive(Default)]
struct SimPort {
    baud: Option<u32>,
    loopback: bool,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    reader: Option<Reader>,
}

impl SimPort {
    fn is_open(&self) -> bool {
        self.baud.is_some()
    }
}

/// Serial ports of the simulated board.
pub struct SerialBank {
    names: NameTable,
    ports: Vec<SimPort>,
    chunk_size: usize,
}

impl SerialBank {
    pub fn from_config(config: &BoardConfig) -> Result<Self, IoError> {
        let ports = config
            .serial_ports
            .iter()
            .map(|p| SimPort {
                loopback: p.loopback,
                ..SimPort::default()
            })
            .collect();
        Ok(Self {
            names: config.port_names()?,
            ports,
            chunk_size: config.serial_chunk_size,
        })
    }

    pub fn normalize(&self, port: &PortId) -> Result<usize, IoError> {
        self.names.port(port)
    }

    /// Open (or reopen) `port` at `baud`.
    pub fn configure(&mut self, port: usize, baud: Option<u32>) -> Result<(), IoError> {
        let baud = baud.unwrap_or(DEFAULT_BAUD);
        if baud == 0 {
            return Err(IoError::InvalidValue("baud rate must be positive".to_string()));
        }
        self.ports[port].baud = Some(baud);
        debug!("serial {} open at {} baud", port, baud);
        Ok(())
    }

    fn ensure_open(&mut self, port: usize) {
        if !self.ports[port].is_open() {
            debug!("serial {} used before configuration, opening at {} baud", port, DEFAULT_BAUD);
            self.ports[port].baud = Some(DEFAULT_BAUD);
        }
    }

    pub fn write(&mut self, port: usize, bytes: &[u8]) {
        self.ensure_open(port);
        let p = &mut self.ports[port];
        p.tx.extend_from_slice(bytes);
        if p.loopback {
            p.rx.extend(bytes);
        }
        trace!("serial {} tx {} byte(s)", port, bytes.len());
    }

    /// Install the reader of `port`, replacing any previous one.
    pub fn read(
        &mut self,
        port: usize,
        id: SubscriptionId,
        max_bytes: Option<usize>,
        handler: BytesHandler,
    ) {
        self.ensure_open(port);
        let previous = self.ports[port].reader.replace(Reader {
            id,
            max_bytes,
            handler,
        });
        if let Some(previous) = previous {
            debug!("serial {}: {} replaced by {}", port, previous.id, id);
        } else {
            debug!("{} serial read on port {}", id, port);
        }
    }

    pub fn stop(&mut self, port: usize) {
        if let Some(reader) = self.ports[port].reader.take() {
            debug!("{} serial read stopped", reader.id);
        }
    }

    pub fn close(&mut self, port: usize) {
        self.stop(port);
        let p = &mut self.ports[port];
        p.baud = None;
        p.rx.clear();
        debug!("serial {} closed", port);
    }

    pub fn flush(&mut self, port: usize) {
        let p = &mut self.ports[port];
        p.rx.clear();
        p.tx.clear();
    }

    /// Bytes arriving from the far end. Dropped while the port is closed.
    pub fn inject(&mut self, port: usize, bytes: &[u8]) {
        let p = &mut self.ports[port];
        if p.is_open() {
            p.rx.extend(bytes);
        } else {
            trace!("serial {} closed, dropped {} byte(s)", port, bytes.len());
        }
    }

    /// Everything transmitted since the last flush.
    pub fn transmitted(&self, port: usize) -> &[u8] {
        &self.ports[port].tx
    }

    /// Hand all buffered bytes to the readers, in chunks.
    pub fn poll(&mut self) {
        let chunk_size = self.chunk_size;
        for port in &mut self.ports {
            let Some(reader) = port.reader.as_mut() else {
                continue;
            };
            let chunk = reader.max_bytes.unwrap_or(chunk_size);
            while !port.rx.is_empty() {
                let n = chunk.min(port.rx.len());
                let data: Vec<u8> = port.rx.drain(..n).collect();
                (reader.handler)(&data);
            }
        }
    }

    pub fn cancel(&mut self, id: SubscriptionId) -> bool {
        for port in &mut self.ports {
            if port.reader.as_ref().is_some_and(|r| r.id == id) {
                port.reader = None;
                return true;
            }
        }
        false
    }

    pub fn subscription_count(&self) -> usize {
        self.ports.iter().filter(|p| p.reader.is_some()).count()
    }

    pub fn clear(&mut self) {
        for port in &mut self.ports {
            port.reader = None;
        }
    }
}
