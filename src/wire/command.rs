/*!
 * Command Records
 * Inbound fixed-size control records
 *
 * Record layout (160 bytes, little-endian):
 *
 * | offset | field       | type      |
 * |--------|-------------|-----------|
 * | 0      | kind        | u32       |
 * | 4      | slot        | i8        |
 * | 5      | (pad)       | [u8; 3]   |
 * | 8      | signal      | i32       |
 * | 12     | payload_len | u32       |
 * | 16     | correlation | u64       |
 * | 24     | term_size   | 4 x u16   |
 * | 32     | payload     | [u8; 128] |
 */

use serde::{Deserialize, Serialize};

use super::{read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
use super::{TermSize, COMMAND_RECORD_LEN};
use crate::core::errors::AgentError;
use crate::core::limits::MAX_PAYLOAD;
use crate::core::types::{AgentResult, CorrelationId, SlotId};

/// Inbound command kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Spawn a shell command line in a free slot
    Run,
    /// Deliver a termination signal to a slot's child
    Kill,
    /// Snapshot the 64-byte occupancy bitmap
    List,
    /// Write raw bytes to a slot's terminal input
    SendInput,
    /// Update a slot's terminal geometry
    Resize,
    /// Liveness probe, always answered PONG
    Ping,
}

impl CommandKind {
    fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(CommandKind::Run),
            1 => Some(CommandKind::Kill),
            2 => Some(CommandKind::List),
            3 => Some(CommandKind::SendInput),
            4 => Some(CommandKind::Resize),
            5 => Some(CommandKind::Ping),
            _ => None,
        }
    }

    fn to_wire(self) -> u32 {
        match self {
            CommandKind::Run => 0,
            CommandKind::Kill => 1,
            CommandKind::List => 2,
            CommandKind::SendInput => 3,
            CommandKind::Resize => 4,
            CommandKind::Ping => 5,
        }
    }
}

/// One decoded inbound command.
///
/// The payload is dynamically sized internally but never exceeds
/// `MAX_PAYLOAD`; decode clamps `payload_len` to the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub slot: SlotId,
    pub signal: i32,
    pub correlation: CorrelationId,
    pub payload: Vec<u8>,
    pub term_size: TermSize,
}

impl Command {
    /// Decode one exact-size record. Unknown kinds are rejected; the
    /// caller discards the record as noise.
    pub fn decode(buf: &[u8; COMMAND_RECORD_LEN]) -> AgentResult<Self> {
        let raw_kind = read_u32(buf, 0);
        let kind = CommandKind::from_wire(raw_kind)
            .ok_or(AgentError::UnknownCommandKind(raw_kind))?;

        let len = (read_u32(buf, 12) as usize).min(MAX_PAYLOAD);
        Ok(Self {
            kind,
            slot: buf[4] as i8,
            signal: read_u32(buf, 8) as i32,
            correlation: read_u64(buf, 16),
            term_size: TermSize {
                rows: read_u16(buf, 24),
                cols: read_u16(buf, 26),
                xpixel: read_u16(buf, 28),
                ypixel: read_u16(buf, 30),
            },
            payload: buf[32..32 + len].to_vec(),
        })
    }

    /// Encode to one exact-size record, truncating the payload at the cap.
    /// The agent itself never sends commands; this is the controller/test
    /// side of the contract.
    pub fn encode(&self) -> [u8; COMMAND_RECORD_LEN] {
        let mut buf = [0u8; COMMAND_RECORD_LEN];
        let len = self.payload.len().min(MAX_PAYLOAD);
        write_u32(&mut buf, 0, self.kind.to_wire());
        buf[4] = self.slot as u8;
        write_u32(&mut buf, 8, self.signal as u32);
        write_u32(&mut buf, 12, len as u32);
        write_u64(&mut buf, 16, self.correlation);
        write_u16(&mut buf, 24, self.term_size.rows);
        write_u16(&mut buf, 26, self.term_size.cols);
        write_u16(&mut buf, 28, self.term_size.xpixel);
        write_u16(&mut buf, 30, self.term_size.ypixel);
        buf[32..32 + len].copy_from_slice(&self.payload[..len]);
        buf
    }

    /// Command line for Run, decoded lossily from the payload bytes.
    pub fn command_line(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
