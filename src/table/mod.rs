/*!
 * Process Table
 * Fixed-capacity slot table with two-phase allocation
 *
 * One lock guards all 64 slots; critical sections are short (allocation
 * scan, occupancy checks, bitmap snapshot, targeting reads). Allocation
 * is two-phase: the dispatcher marks a slot `Allocating` and releases the
 * lock; the supervisor later activates or releases it with its own lock
 * acquisitions, so no lock ever crosses a thread boundary.
 */

mod slot;

pub use slot::{LiveTarget, SlotState};

use std::fs::File;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::errors::AgentError;
use crate::core::limits::MAX_SLOTS;
use crate::core::types::{AgentResult, SlotId};
use crate::wire::TermSize;

use slot::Slot;

/// Supervisor-owning table of process slots
pub struct ProcessTable {
    slots: Mutex<Vec<Slot>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        let slots = (0..MAX_SLOTS).map(|_| Slot::empty()).collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    fn index(slot: SlotId) -> Option<usize> {
        if slot < 0 || slot as usize >= MAX_SLOTS {
            None
        } else {
            Some(slot as usize)
        }
    }

    /// Claim the lowest-index free slot for a new process. The slot is
    /// `Allocating` until the supervisor activates or releases it, and no
    /// second Run can claim it in between.
    pub fn allocate(&self, command_line: &str, term_size: TermSize) -> Option<SlotId> {
        let mut slots = self.slots.lock();
        let idx = slots.iter().position(|s| s.state == SlotState::Free)?;
        let slot = &mut slots[idx];
        slot.clear();
        slot.state = SlotState::Allocating;
        slot.command_line = command_line.to_string();
        slot.term_size = term_size;
        debug!(slot = idx, command = command_line, "Slot allocated");
        Some(idx as SlotId)
    }

    /// Record the spawned child and hand the slot's runtime fields to the
    /// supervisor. Supervisor-only, exactly once per lifecycle.
    pub fn activate(&self, slot: SlotId, pid: u32, master: Arc<File>) {
        let Some(idx) = Self::index(slot) else {
            warn!(slot, "Activate on out-of-range slot ignored");
            return;
        };
        let mut slots = self.slots.lock();
        let entry = &mut slots[idx];
        if entry.state != SlotState::Allocating {
            warn!(slot, state = ?entry.state, "Activate on slot not in Allocating state");
            return;
        }
        entry.state = SlotState::Running;
        entry.pid = Some(pid);
        entry.master = Some(master);
        debug!(slot, pid, "Slot active");
    }

    /// Return a slot to the free pool. The owning supervisor calls this
    /// exactly once, after it has emitted the slot's Stopped event; it is
    /// the only transition back to Free.
    pub fn release(&self, slot: SlotId) {
        let Some(idx) = Self::index(slot) else {
            warn!(slot, "Release on out-of-range slot ignored");
            return;
        };
        let mut slots = self.slots.lock();
        if slots[idx].state == SlotState::Free {
            warn!(slot, "Release on already-free slot ignored");
            return;
        }
        slots[idx].clear();
        debug!(slot, "Slot released");
    }

    /// Targeting lookup for Kill/SendInput/Resize. Only a Running slot
    /// has a pid and a terminal to act on; anything else is answered with
    /// the `tid_killed` taxonomy.
    pub fn target(&self, slot: SlotId) -> AgentResult<LiveTarget> {
        let idx = Self::index(slot).ok_or(AgentError::NoSuchTarget(slot))?;
        let slots = self.slots.lock();
        let entry = &slots[idx];
        match (entry.state, entry.pid, &entry.master) {
            (SlotState::Running, Some(pid), Some(master)) => Ok(LiveTarget {
                pid,
                master: Arc::clone(master),
            }),
            _ => Err(AgentError::NoSuchTarget(slot)),
        }
    }

    /// Update the recorded terminal size of a Running slot.
    pub fn set_term_size(&self, slot: SlotId, size: TermSize) {
        if let Some(idx) = Self::index(slot) {
            let mut slots = self.slots.lock();
            if slots[idx].state == SlotState::Running {
                slots[idx].term_size = size;
            }
        }
    }

    /// Occupancy bitmap snapshot: one byte per slot, 1 = occupied.
    /// Allocating counts as occupied (the slot is already claimed).
    pub fn occupancy_bitmap(&self) -> [u8; MAX_SLOTS] {
        let slots = self.slots.lock();
        let mut bitmap = [0u8; MAX_SLOTS];
        for (byte, slot) in bitmap.iter_mut().zip(slots.iter()) {
            *byte = (slot.state != SlotState::Free) as u8;
        }
        bitmap
    }

    /// Number of occupied slots (diagnostics)
    pub fn occupied(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|s| s.state != SlotState::Free)
            .count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn size() -> TermSize {
        TermSize {
            rows: 24,
            cols: 80,
            xpixel: 0,
            ypixel: 0,
        }
    }

    fn fake_master() -> Arc<File> {
        Arc::new(tempfile::tempfile().unwrap())
    }

    #[test]
    fn test_allocate_lowest_index_first() {
        let table = ProcessTable::new();
        assert_eq!(table.allocate("a", size()), Some(0));
        assert_eq!(table.allocate("b", size()), Some(1));
        table.release(0);
        assert_eq!(table.allocate("c", size()), Some(0));
    }

    #[test]
    fn test_allocate_exhausts_at_capacity() {
        let table = ProcessTable::new();
        for i in 0..MAX_SLOTS {
            assert_eq!(table.allocate("x", size()), Some(i as SlotId));
        }
        assert_eq!(table.allocate("overflow", size()), None);

        table.release(17);
        assert_eq!(table.allocate("again", size()), Some(17));
        assert_eq!(table.allocate("full", size()), None);
    }

    #[test]
    fn test_allocating_slot_is_not_a_target() {
        let table = ProcessTable::new();
        let slot = table.allocate("sleep 1", size()).unwrap();
        assert_eq!(
            table.target(slot).unwrap_err(),
            AgentError::NoSuchTarget(slot)
        );

        table.activate(slot, 4242, fake_master());
        let target = table.target(slot).unwrap();
        assert_eq!(target.pid, 4242);
    }

    #[test]
    fn test_target_validates_range_and_occupancy() {
        let table = ProcessTable::new();
        for slot in [-1i8, 64, 5] {
            assert_eq!(
                table.target(slot).unwrap_err(),
                AgentError::NoSuchTarget(slot)
            );
        }
    }

    #[test]
    fn test_release_frees_target() {
        let table = ProcessTable::new();
        let slot = table.allocate("true", size()).unwrap();
        table.activate(slot, 1, fake_master());
        assert!(table.target(slot).is_ok());

        table.release(slot);
        assert_eq!(
            table.target(slot).unwrap_err(),
            AgentError::NoSuchTarget(slot)
        );
        assert_eq!(table.occupied(), 0);
    }

    #[test]
    fn test_occupancy_bitmap_snapshot() {
        let table = ProcessTable::new();
        let a = table.allocate("a", size()).unwrap();
        let b = table.allocate("b", size()).unwrap();
        table.activate(b, 2, fake_master());

        let bitmap = table.occupancy_bitmap();
        assert_eq!(bitmap.len(), MAX_SLOTS);
        assert_eq!(bitmap[a as usize], 1);
        assert_eq!(bitmap[b as usize], 1);
        assert_eq!(bitmap.iter().filter(|&&b| b == 1).count(), 2);
    }

    #[test]
    fn test_concurrent_allocation_is_disjoint() {
        use std::collections::HashSet;
        use std::thread;

        let table = Arc::new(ProcessTable::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                let mut won = Vec::new();
                for _ in 0..16 {
                    if let Some(slot) = table.allocate("spin", size()) {
                        won.push(slot);
                    }
                }
                won
            }));
        }

        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        // 8 threads x 16 attempts = 128 attempts against 64 slots:
        // exactly 64 winners, no slot handed out twice.
        assert_eq!(all.len(), MAX_SLOTS);
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), MAX_SLOTS);
    }
}
