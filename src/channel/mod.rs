/*!
 * Control Channels
 * Exact-size record transport over the inbound/outbound control devices
 *
 * The devices deliver whole records reliably and in order; there is no
 * framing layer. A read that does not return exactly one record is noise
 * and is discarded without resynchronization.
 */

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::errors::AgentError;
use crate::core::types::AgentResult;
use crate::wire::{Event, COMMAND_RECORD_LEN};

/// Default inbound control device
pub const DEFAULT_RX_PATH: &str = "/etc/.vmpdrvfna_rx";

/// Default outbound control device
pub const DEFAULT_TX_PATH: &str = "/etc/.vmpdrvfna_tx";

/// Agent configuration, environment-driven
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub rx_path: PathBuf,
    pub tx_path: PathBuf,
}

impl AgentConfig {
    /// Read configuration from the environment, falling back to the
    /// built-in device paths.
    pub fn from_env() -> Self {
        let rx_path = std::env::var("VMPROC_RX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RX_PATH));
        let tx_path = std::env::var("VMPROC_TX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TX_PATH));
        Self { rx_path, tx_path }
    }
}

/// Outcome of one inbound read
#[derive(Debug)]
pub enum Inbound {
    /// Exactly one record arrived
    Record(Box<[u8; COMMAND_RECORD_LEN]>),
    /// A short/partial read of this many bytes, discarded as noise
    Discarded(usize),
    /// The channel reached end of stream
    Closed,
}

/// Inbound record reader
pub struct RxChannel<R> {
    inner: R,
}

impl RxChannel<File> {
    /// Open the inbound device for reading. Failure here is fatal.
    pub fn open(path: &Path) -> AgentResult<Self> {
        let inner = File::open(path).map_err(|e| AgentError::ChannelOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "Inbound channel open");
        Ok(Self { inner })
    }
}

impl<R: Read> RxChannel<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Block for the next read and classify it. One call, one read: a
    /// record is never assembled across reads, so anything other than an
    /// exact-size read is discarded.
    pub fn next(&mut self) -> io::Result<Inbound> {
        let mut buf = Box::new([0u8; COMMAND_RECORD_LEN]);
        match self.inner.read(&mut buf[..])? {
            0 => Ok(Inbound::Closed),
            n if n == COMMAND_RECORD_LEN => Ok(Inbound::Record(buf)),
            n => Ok(Inbound::Discarded(n)),
        }
    }
}

/// Outbound record writer. The flush loop is the sole user.
pub struct TxChannel<W> {
    inner: W,
}

impl TxChannel<File> {
    /// Open the outbound device for writing. Failure here is fatal.
    pub fn open(path: &Path) -> AgentResult<Self> {
        let inner = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| AgentError::ChannelOpen {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        info!(path = %path.display(), "Outbound channel open");
        Ok(Self { inner })
    }
}

impl<W: Write> TxChannel<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one exact-size event record.
    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        self.inner.write_all(&event.encode())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
