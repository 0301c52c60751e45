/*!
 * System Limits and Constants
 *
 * Centralized location for the agent's fixed capacities and intervals.
 * The capacities are part of the wire contract with the controller and
 * must not change without a protocol revision.
 */

use std::time::Duration;

/// Maximum number of process slots.
/// [WIRE] Also the length of the occupancy bitmap returned by List.
pub const MAX_SLOTS: usize = 64;

/// Outbound event queue capacity.
/// Producers block when the queue is full; nothing is ever dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Inline payload capacity of both command and event records.
/// [WIRE] Oversized payloads are truncated at this boundary.
pub const MAX_PAYLOAD: usize = 128;

/// Read chunk size for the pty output pump. One Stdout event is emitted
/// per chunk, so this never exceeds MAX_PAYLOAD.
pub const READ_CHUNK: usize = MAX_PAYLOAD;

/// Interval between outbound flush cycles.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound on how long a supervisor waits in poll() before it
/// re-checks its child for exit. Bounds Kill-to-Stopped latency.
pub const EXIT_POLL_TIMEOUT_MS: u16 = 20;

/// Sleep between exit checks once the master side has reached EOF
/// (child closed its terminal but has not exited yet).
pub const EXIT_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Backoff after a failed inbound read before the next attempt.
pub const READ_RETRY_INTERVAL: Duration = Duration::from_millis(20);
