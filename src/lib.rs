/*!
 * In-Guest Process-Supervision Agent
 * Guest-side control plane for remote process execution
 *
 * Receives fixed-record commands on an inbound control device, runs up
 * to 64 children each on its own pseudo-terminal, and relays output and
 * lifecycle events back over an outbound control device.
 */

pub mod channel;
pub mod core;
pub mod dispatch;
pub mod events;
pub mod reader;
pub mod supervisor;
pub mod table;
pub mod wire;

// Re-exports
pub use crate::core::{init_tracing, AgentError, AgentResult, CorrelationId, SlotId};
pub use channel::{AgentConfig, Inbound, RxChannel, TxChannel};
pub use dispatch::Dispatcher;
pub use events::{spawn_flush_loop, EventQueue};
pub use reader::InboundReader;
pub use supervisor::Supervisor;
pub use table::{LiveTarget, ProcessTable, SlotState};
pub use wire::{Command, CommandKind, Event, EventKind, TermSize};
