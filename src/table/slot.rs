/*!
 * Slot Types
 * Per-slot state for the process table
 */

use std::fs::File;
use std::sync::Arc;

use serde::Serialize;

use crate::wire::TermSize;

/// Slot lifecycle state.
///
/// `Free -> Allocating` happens under the table lock during Run dispatch;
/// `Allocating -> Running` (activate) and `-> Free` (release) are driven
/// by the owning supervisor. `Running -> Free` is release only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Free,
    Allocating,
    Running,
}

/// One process table entry
#[derive(Debug)]
pub(super) struct Slot {
    pub state: SlotState,
    pub command_line: String,
    pub term_size: TermSize,
    pub pid: Option<u32>,
    pub master: Option<Arc<File>>,
}

impl Slot {
    pub fn empty() -> Self {
        Self {
            state: SlotState::Free,
            command_line: String::new(),
            term_size: TermSize::default(),
            pid: None,
            master: None,
        }
    }

    pub fn clear(&mut self) {
        *self = Slot::empty();
    }
}

/// Live targeting handle for Kill/SendInput/Resize.
///
/// The master handle is a shared clone, so a write that races a release
/// lands on a closed-off pty rather than a reused descriptor.
#[derive(Debug, Clone)]
pub struct LiveTarget {
    pub pid: u32,
    pub master: Arc<File>,
}
