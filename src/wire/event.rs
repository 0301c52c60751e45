/*!
 * Event Records
 * Outbound fixed-size event records
 *
 * Record layout (152 bytes, little-endian):
 *
 * | offset | field       | type      |
 * |--------|-------------|-----------|
 * | 0      | kind        | u32       |
 * | 4      | slot        | i8        |
 * | 5      | error       | u8        |
 * | 6      | (pad)       | [u8; 2]   |
 * | 8      | correlation | u64       |
 * | 16     | payload_len | u32       |
 * | 20     | (pad)       | [u8; 4]   |
 * | 24     | payload     | [u8; 128] |
 */

use serde::{Deserialize, Serialize};

use super::{read_u32, read_u64, write_u32, write_u64, EVENT_RECORD_LEN};
use crate::core::errors::AgentError;
use crate::core::limits::MAX_PAYLOAD;
use crate::core::types::{AgentResult, CorrelationId, SlotId};

/// Outbound event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Agent is ready (sent once at startup)
    Online,
    /// One chunk of child terminal output
    Stdout,
    /// Result of a dispatched command
    CommandResult,
    /// A supervised child terminated
    Stopped,
}

impl EventKind {
    fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(EventKind::Online),
            1 => Some(EventKind::Stdout),
            2 => Some(EventKind::CommandResult),
            3 => Some(EventKind::Stopped),
            _ => None,
        }
    }

    fn to_wire(self) -> u32 {
        match self {
            EventKind::Online => 0,
            EventKind::Stdout => 1,
            EventKind::CommandResult => 2,
            EventKind::Stopped => 3,
        }
    }
}

/// One outbound event.
///
/// Constructors enforce the payload cap so a producer can never build an
/// event that fails to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub slot: SlotId,
    pub error: bool,
    pub correlation: CorrelationId,
    pub payload: Vec<u8>,
}

impl Event {
    fn new(
        kind: EventKind,
        slot: SlotId,
        error: bool,
        correlation: CorrelationId,
        payload: &[u8],
    ) -> Self {
        let len = payload.len().min(MAX_PAYLOAD);
        Self {
            kind,
            slot,
            error,
            correlation,
            payload: payload[..len].to_vec(),
        }
    }

    /// Unsolicited readiness event, emitted once after startup.
    pub fn online() -> Self {
        Self::new(EventKind::Online, 0, false, 0, &[])
    }

    /// One chunk of terminal output from a slot, byte order preserved.
    pub fn stdout(slot: SlotId, chunk: &[u8]) -> Self {
        Self::new(EventKind::Stdout, slot, false, 0, chunk)
    }

    /// Command result carrying a reason string, correlation echoed.
    pub fn result(
        correlation: CorrelationId,
        slot: SlotId,
        error: bool,
        reason: &str,
    ) -> Self {
        Self::new(
            EventKind::CommandResult,
            slot,
            error,
            correlation,
            reason.as_bytes(),
        )
    }

    /// Command result with a binary payload (the List bitmap).
    pub fn result_payload(correlation: CorrelationId, payload: &[u8]) -> Self {
        Self::new(EventKind::CommandResult, 0, false, correlation, payload)
    }

    /// Exit notification for a slot. The correlation field carries the
    /// exit code for normal exits and the OS errno for spawn failures.
    pub fn stopped(
        slot: SlotId,
        error: bool,
        correlation: CorrelationId,
        reason: &str,
    ) -> Self {
        Self::new(EventKind::Stopped, slot, error, correlation, reason.as_bytes())
    }

    /// Encode to one exact-size record, truncating the payload at the
    /// cap. The constructors already clamp, but the fields are public and
    /// a hand-built event must not be able to break the record size.
    pub fn encode(&self) -> [u8; EVENT_RECORD_LEN] {
        let mut buf = [0u8; EVENT_RECORD_LEN];
        let len = self.payload.len().min(MAX_PAYLOAD);
        write_u32(&mut buf, 0, self.kind.to_wire());
        buf[4] = self.slot as u8;
        buf[5] = self.error as u8;
        write_u64(&mut buf, 8, self.correlation);
        write_u32(&mut buf, 16, len as u32);
        buf[24..24 + len].copy_from_slice(&self.payload[..len]);
        buf
    }

    /// Decode one exact-size record (controller/test side).
    pub fn decode(buf: &[u8; EVENT_RECORD_LEN]) -> AgentResult<Self> {
        let raw_kind = read_u32(buf, 0);
        let kind =
            EventKind::from_wire(raw_kind).ok_or(AgentError::UnknownEventKind(raw_kind))?;
        let len = (read_u32(buf, 16) as usize).min(MAX_PAYLOAD);
        Ok(Self {
            kind,
            slot: buf[4] as i8,
            error: buf[5] != 0,
            correlation: read_u64(buf, 8),
            payload: buf[24..24 + len].to_vec(),
        })
    }

    /// Reason string view for result/stopped events.
    pub fn reason(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_roundtrip() {
        let ev = Event::result(7, 3, true, "tid_killed");
        let decoded = Event::decode(&ev.encode()).unwrap();
        assert_eq!(decoded, ev);
        assert_eq!(decoded.reason(), "tid_killed");
    }

    #[test]
    fn test_online_shape() {
        let ev = Event::online();
        assert_eq!(ev.slot, 0);
        assert_eq!(ev.correlation, 0);
        assert!(ev.payload.is_empty());
        assert!(!ev.error);
    }

    #[test]
    fn test_stdout_chunk_cap() {
        let big = vec![0xaau8; 200];
        let ev = Event::stdout(1, &big);
        assert_eq!(ev.payload.len(), MAX_PAYLOAD);
        assert_eq!(ev.correlation, 0);
    }

    #[test]
    fn test_oversized_literal_payload_clamped_on_encode() {
        // Struct literal sidesteps the clamping constructors.
        let ev = Event {
            kind: EventKind::Stdout,
            slot: 1,
            error: false,
            correlation: 0,
            payload: vec![0x55; 300],
        };
        let decoded = Event::decode(&ev.encode()).unwrap();
        assert_eq!(decoded.payload.len(), MAX_PAYLOAD);
        assert_eq!(decoded.payload, vec![0x55; MAX_PAYLOAD]);
    }

    #[test]
    fn test_stopped_carries_exit_code() {
        let ev = Event::stopped(5, false, 3, "normal");
        let buf = ev.encode();
        assert_eq!(read_u64(&buf, 8), 3);
        assert_eq!(buf[4] as i8, 5);
        assert_eq!(buf[5], 0);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut buf = Event::online().encode();
        write_u32(&mut buf, 0, 42);
        assert_eq!(Event::decode(&buf), Err(AgentError::UnknownEventKind(42)));
    }
}
