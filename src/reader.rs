/*!
 * Inbound Reader
 * Top-level loop consuming command records from the inbound channel
 *
 * Strictly serial: one record read, decoded, and dispatched to completion
 * before the next read. Short reads and undecodable records are noise.
 */

use std::io::{ErrorKind, Read};
use std::thread;

use tracing::{debug, info, warn};

use crate::channel::{Inbound, RxChannel};
use crate::core::limits::READ_RETRY_INTERVAL;
use crate::dispatch::Dispatcher;
use crate::wire::Command;

/// Serial command loop over the inbound channel
pub struct InboundReader<R> {
    rx: RxChannel<R>,
    dispatcher: Dispatcher,
}

impl<R: Read> InboundReader<R> {
    pub fn new(rx: RxChannel<R>, dispatcher: Dispatcher) -> Self {
        Self { rx, dispatcher }
    }

    /// Run until the channel closes. The control device never closes in
    /// production; EOF only ends test runs. Read errors are noise, like
    /// short reads: log and keep going. Only channel open is fatal, and
    /// that happened before this loop started.
    pub fn run(mut self) {
        loop {
            match self.rx.next() {
                Ok(Inbound::Record(buf)) => match Command::decode(&buf) {
                    Ok(command) => self.dispatcher.dispatch(command),
                    Err(e) => debug!(error = %e, "Discarding undecodable record"),
                },
                Ok(Inbound::Discarded(n)) => {
                    debug!(bytes = n, "Discarding short read");
                }
                Ok(Inbound::Closed) => {
                    info!("Inbound channel closed, reader exiting");
                    return;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "Inbound read failed, retrying");
                    thread::sleep(READ_RETRY_INTERVAL);
                }
            }
        }
    }
}
