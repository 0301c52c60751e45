/*!
 * Event Queue
 * Bounded outbound mailbox with a periodic flush loop
 *
 * Producers (dispatcher, supervisors) append; one flush thread drains the
 * whole queue each cycle and writes the batch to the outbound channel in
 * insertion order. A full queue blocks producers on a condvar; no event
 * is ever dropped.
 */

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{info, warn};

use crate::channel::TxChannel;
use crate::core::limits::{EVENT_QUEUE_CAPACITY, FLUSH_INTERVAL};
use crate::wire::Event;

/// Bounded outbound event mailbox
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    not_full: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(EVENT_QUEUE_CAPACITY)),
            not_full: Condvar::new(),
        }
    }

    /// Append one event, blocking while the queue is at capacity.
    pub fn push(&self, event: Event) {
        let mut queue = self.inner.lock();
        while queue.len() >= EVENT_QUEUE_CAPACITY {
            self.not_full.wait(&mut queue);
        }
        queue.push_back(event);
    }

    /// Atomically take the entire queue contents, in insertion order.
    pub fn drain(&self) -> Vec<Event> {
        let mut queue = self.inner.lock();
        let batch: Vec<Event> = queue.drain(..).collect();
        if !batch.is_empty() {
            self.not_full.notify_all();
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the flush loop: drain the queue every cycle and write the batch
/// to the outbound channel. Single instance, sole channel writer, runs
/// for the lifetime of the agent.
pub fn spawn_flush_loop<W: Write + Send + 'static>(
    queue: Arc<EventQueue>,
    mut tx: TxChannel<W>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("event-flush".into())
        .spawn(move || {
            info!("Event flush loop running");
            loop {
                let batch = queue.drain();
                if !batch.is_empty() {
                    for event in &batch {
                        if let Err(e) = tx.write_event(event) {
                            warn!(error = %e, "Outbound write failed, event lost to channel");
                        }
                    }
                    if let Err(e) = tx.flush() {
                        warn!(error = %e, "Outbound flush failed");
                    }
                }
                thread::sleep(FLUSH_INTERVAL);
            }
        })
}
