/*!
 * Wire Records
 * Fixed-size binary records exchanged with the controller
 *
 * Both channels carry exact-size records with no framing: the inbound
 * channel delivers 160-byte Command records, the outbound channel
 * 152-byte Event records. All integers are little-endian. Field widths
 * and the 128-byte inline payload cap are the interoperability contract.
 */

pub mod command;
pub mod event;

pub use command::{Command, CommandKind};
pub use event::{Event, EventKind};

use serde::{Deserialize, Serialize};

/// Exact size of one inbound Command record
pub const COMMAND_RECORD_LEN: usize = 160;

/// Exact size of one outbound Event record
pub const EVENT_RECORD_LEN: usize = 152;

/// Terminal geometry requested by Run and Resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
    pub xpixel: u16,
    pub ypixel: u16,
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(crate) fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

pub(crate) fn write_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
