/*!
 * Error Types
 * Centralized error handling with thiserror and miette support
 */

use miette::Diagnostic;
use thiserror::Error;

use super::types::SlotId;

/// Agent errors.
///
/// Everything here is recovered locally and reported to the controller as
/// an event carrying `reason()`; only `ChannelOpen` is fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum AgentError {
    #[error("no free process slot")]
    #[diagnostic(
        code(table::exhausted),
        help("All 64 slots are occupied. Kill a process or wait for one to exit.")
    )]
    TableFull,

    #[error("slot {0} has no running process")]
    #[diagnostic(
        code(table::no_target),
        help("The slot is out of range, free, or its process is still starting.")
    )]
    NoSuchTarget(SlotId),

    #[error("pseudo-terminal allocation failed: {0}")]
    #[diagnostic(
        code(supervisor::pty_failed),
        help("The kernel refused a pty pair. Check /dev/ptmx availability and fd limits.")
    )]
    PtyAllocation(String),

    #[error("child spawn failed (errno {errno}): {message}")]
    #[diagnostic(
        code(supervisor::spawn_failed),
        help("The shell could not be executed. The errno is relayed to the controller.")
    )]
    SpawnFailed { errno: i32, message: String },

    #[error("malformed command record: unknown kind {0}")]
    #[diagnostic(
        code(wire::unknown_kind),
        help("The record decoded to an out-of-range command kind and was discarded.")
    )]
    UnknownCommandKind(u32),

    #[error("malformed event record: unknown kind {0}")]
    #[diagnostic(code(wire::unknown_event_kind))]
    UnknownEventKind(u32),

    #[error("failed to open control channel {path}: {message}")]
    #[diagnostic(
        code(channel::open_failed),
        help("The control device must exist before the agent starts. This error is fatal.")
    )]
    ChannelOpen { path: String, message: String },
}

impl AgentError {
    /// Short machine-readable reason string carried in the payload of
    /// error events. These strings are part of the wire contract.
    pub fn reason(&self) -> &'static str {
        match self {
            AgentError::TableFull => "no_tid",
            AgentError::NoSuchTarget(_) => "tid_killed",
            AgentError::PtyAllocation(_) => "no_pty",
            AgentError::SpawnFailed { .. } => "launch_fail",
            AgentError::UnknownCommandKind(_) | AgentError::UnknownEventKind(_) => "bad_record",
            AgentError::ChannelOpen { .. } => "channel",
        }
    }
}
