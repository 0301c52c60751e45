/*!
 * Process Supervisor
 * One instance per active slot: spawn, pump, exit detection
 *
 * State machine: Starting -> Running -> Draining -> Stopped. After
 * Starting hands off, the supervisor is the sole writer of its slot's
 * runtime fields, and releasing the slot on exit is its job alone.
 */

pub mod pty;

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use nix::poll::PollTimeout;
use tracing::{debug, info, warn};

use crate::core::limits::{EXIT_POLL_TIMEOUT_MS, EXIT_RETRY_INTERVAL, READ_CHUNK};
use crate::core::types::SlotId;
use crate::events::EventQueue;
use crate::table::ProcessTable;
use crate::wire::{Event, TermSize};

use pty::{open_raw_pty, set_nonblocking, wait_readable};

/// Supervisor for one slot's child process
pub struct Supervisor {
    slot: SlotId,
    command_line: String,
    term_size: TermSize,
    table: Arc<ProcessTable>,
    events: Arc<EventQueue>,
}

impl Supervisor {
    /// Start a supervisor thread for an allocated slot. The slot must be
    /// in the Allocating state; this thread activates or releases it.
    pub fn start(
        slot: SlotId,
        command_line: String,
        term_size: TermSize,
        table: Arc<ProcessTable>,
        events: Arc<EventQueue>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("slot-{slot}"))
            .spawn(move || {
                Supervisor {
                    slot,
                    command_line,
                    term_size,
                    table,
                    events,
                }
                .run()
            })
    }

    fn run(self) {
        let (child, master) = match self.starting() {
            Ok(pair) => pair,
            Err(stop) => {
                self.events.push(stop);
                self.table.release(self.slot);
                return;
            }
        };

        let stopped = self.pump(child, &master);
        self.events.push(stopped);
        self.table.release(self.slot);
        // master drops here; the slot's clone was cleared by release.
    }

    /// Starting: allocate the terminal, spawn the child attached to the
    /// slave side, activate the slot. Errors become the slot's single
    /// Stopped event.
    fn starting(&self) -> Result<(Child, Arc<File>), Event> {
        let pair = open_raw_pty(self.term_size).map_err(|e| {
            warn!(slot = self.slot, error = %e, "Pty allocation failed");
            Event::stopped(self.slot, true, 0, e.reason())
        })?;

        let stdin = pair.slave.try_clone().map_err(|e| self.launch_failure(&e))?;
        let stdout = pair.slave.try_clone().map_err(|e| self.launch_failure(&e))?;

        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(&self.command_line)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(pair.slave))
            .env_clear()
            .env("TERM", "xterm-256color")
            .env("COLORTERM", "truecolor");

        // New session with the slave as controlling terminal, so a later
        // signal reaches the whole child tree. Runs between fork and
        // exec: libc only.
        unsafe {
            command.pre_exec(|| {
                if nix::libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        match command.spawn() {
            Ok(child) => {
                let master = Arc::new(File::from(pair.master));
                // Dispatcher input writes share this fd; a blocking write
                // would stall the whole command loop behind one slot.
                if let Err(e) = set_nonblocking(&master) {
                    warn!(slot = self.slot, error = %e, "Failed to set master non-blocking");
                }
                self.table
                    .activate(self.slot, child.id(), Arc::clone(&master));
                info!(
                    slot = self.slot,
                    pid = child.id(),
                    command = %self.command_line,
                    "Child spawned"
                );
                Ok((child, master))
            }
            Err(e) => {
                warn!(slot = self.slot, error = %e, "Spawn failed");
                Err(self.launch_failure(&e))
            }
        }
        // Command drops here, closing the supervisor's slave handles.
    }

    fn launch_failure(&self, e: &std::io::Error) -> Event {
        let errno = e.raw_os_error().unwrap_or(0);
        Event::stopped(self.slot, true, errno as u64, "launch_fail")
    }

    /// Running and Draining: relay output chunks until the child exits,
    /// then drain the tail and classify. Returns the single Stopped event.
    fn pump(&self, mut child: Child, master: &File) -> Event {
        let mut output_open = true;
        loop {
            if output_open {
                output_open = self.drain_output(master);
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    // Draining: the exit may have raced buffered output.
                    if output_open {
                        self.drain_output(master);
                    }
                    return self.classify(status);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(slot = self.slot, error = %e, "Wait on child failed");
                    return Event::stopped(self.slot, true, 0, "err_waitpid");
                }
            }

            if output_open {
                wait_readable(master, PollTimeout::from(EXIT_POLL_TIMEOUT_MS));
            } else {
                thread::sleep(EXIT_RETRY_INTERVAL);
            }
        }
    }

    /// Relay every immediately available chunk as a Stdout event. Returns
    /// false once the master side has reached EOF.
    fn drain_output(&self, master: &File) -> bool {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if !wait_readable(master, PollTimeout::ZERO) {
                return true;
            }
            match (&*master).read(&mut buf) {
                Ok(0) => return false,
                Ok(n) => self.events.push(Event::stdout(self.slot, &buf[..n])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
                // EIO: every slave handle is gone.
                Err(e) => {
                    debug!(slot = self.slot, error = %e, "Master side closed");
                    return false;
                }
            }
        }
    }

    fn classify(&self, status: ExitStatus) -> Event {
        if let Some(code) = status.code() {
            info!(slot = self.slot, code, "Child exited");
            Event::stopped(self.slot, false, code as u64, "normal")
        } else if let Some(signal) = status.signal() {
            info!(slot = self.slot, signal, "Child terminated by signal");
            Event::stopped(self.slot, true, 0, "sig")
        } else {
            warn!(slot = self.slot, "Unclassifiable exit status");
            Event::stopped(self.slot, true, 0, "exit_unknown")
        }
    }
}
