/*!
 * Command Dispatcher
 * Validates each inbound command and routes it to the table, a live
 * slot, or a new supervisor
 *
 * Commands are handled strictly one at a time; each result event is
 * enqueued before the next command is taken, so result order matches
 * command arrival order.
 */

use std::io::Write;
use std::sync::Arc;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::events::EventQueue;
use crate::supervisor::pty::resize_terminal;
use crate::supervisor::Supervisor;
use crate::table::ProcessTable;
use crate::wire::{Command, CommandKind, Event};

/// Serial dispatcher over the shared table and event queue
pub struct Dispatcher {
    table: Arc<ProcessTable>,
    events: Arc<EventQueue>,
}

impl Dispatcher {
    pub fn new(table: Arc<ProcessTable>, events: Arc<EventQueue>) -> Self {
        Self { table, events }
    }

    /// Handle one command to completion (result event enqueued).
    pub fn dispatch(&self, command: Command) {
        debug!(
            kind = ?command.kind,
            slot = command.slot,
            correlation = command.correlation,
            "Dispatching command"
        );
        match command.kind {
            CommandKind::Run => self.handle_run(&command),
            CommandKind::Kill => self.handle_kill(&command),
            CommandKind::List => self.handle_list(&command),
            CommandKind::SendInput => self.handle_send_input(&command),
            CommandKind::Resize => self.handle_resize(&command),
            CommandKind::Ping => self
                .events
                .push(Event::result(command.correlation, 0, false, "PONG")),
        }
    }

    fn handle_run(&self, command: &Command) {
        let command_line = command.command_line();
        let Some(slot) = self.table.allocate(&command_line, command.term_size) else {
            self.events
                .push(Event::result(command.correlation, 0, true, "no_tid"));
            return;
        };

        // Result first, then the supervisor: the controller learns the
        // slot id before any event from the new process can arrive.
        self.events
            .push(Event::result(command.correlation, slot, false, "succ"));

        let spawned = Supervisor::start(
            slot,
            command_line,
            command.term_size,
            Arc::clone(&self.table),
            Arc::clone(&self.events),
        );
        if let Err(e) = spawned {
            warn!(slot, error = %e, "Supervisor thread failed to start");
            self.events
                .push(Event::stopped(slot, true, 0, "launch_fail"));
            self.table.release(slot);
        }
    }

    fn handle_kill(&self, command: &Command) {
        let target = match self.table.target(command.slot) {
            Ok(target) => target,
            Err(e) => {
                self.events
                    .push(Event::result(command.correlation, 0, true, e.reason()));
                return;
            }
        };

        let signal = if command.signal > 0 {
            Signal::try_from(command.signal).unwrap_or(Signal::SIGKILL)
        } else {
            Signal::SIGKILL
        };
        if let Err(e) = kill(Pid::from_raw(target.pid as i32), signal) {
            // The child may have exited between the lookup and the kill;
            // its supervisor will still emit the Stopped event.
            warn!(slot = command.slot, pid = target.pid, error = %e, "Kill failed");
        }
        self.events
            .push(Event::result(command.correlation, 0, false, "succ"));
    }

    fn handle_list(&self, command: &Command) {
        let bitmap = self.table.occupancy_bitmap();
        self.events
            .push(Event::result_payload(command.correlation, &bitmap));
    }

    fn handle_send_input(&self, command: &Command) {
        let target = match self.table.target(command.slot) {
            Ok(target) => target,
            Err(e) => {
                self.events
                    .push(Event::result(command.correlation, 0, true, e.reason()));
                return;
            }
        };

        // Write failures, including EAGAIN when the child is not reading
        // its terminal, are logged but not surfaced; the controller still
        // sees succ. Known protocol gap.
        if let Err(e) = (&*target.master).write_all(&command.payload) {
            warn!(slot = command.slot, error = %e, "Input write failed");
        }
        self.events
            .push(Event::result(command.correlation, 0, false, "succ"));
    }

    fn handle_resize(&self, command: &Command) {
        let target = match self.table.target(command.slot) {
            Ok(target) => target,
            Err(e) => {
                self.events
                    .push(Event::result(command.correlation, 0, true, e.reason()));
                return;
            }
        };

        if let Err(e) = resize_terminal(&target.master, command.term_size) {
            warn!(slot = command.slot, error = %e, "Resize ioctl failed");
        }
        self.table.set_term_size(command.slot, command.term_size);
        self.events
            .push(Event::result(command.correlation, 0, false, "succ"));
    }
}
