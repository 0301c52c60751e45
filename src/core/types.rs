/*!
 * Core Types
 * Common types used across the agent
 */

/// Slot identifier as carried on the wire.
///
/// Signed on purpose: the controller sends -1 (or any out-of-range value)
/// to mean "no target". Valid ids are `0..MAX_SLOTS`.
pub type SlotId = i8;

/// Caller-chosen opaque value echoed back verbatim on the matching result
/// event. 0 marks unsolicited events (Online, Stdout, Stopped).
pub type CorrelationId = u64;

/// Common result type for agent operations
pub type AgentResult<T> = Result<T, super::errors::AgentError>;
