/*!
 * Pseudo-Terminal Plumbing
 * Pty pair allocation, raw mode, readiness polling, and resize
 */

use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::{openpty, Winsize};
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};

use crate::core::errors::AgentError;
use crate::core::types::AgentResult;
use crate::wire::TermSize;

nix::ioctl_write_ptr_bad!(tiocswinsz, nix::libc::TIOCSWINSZ, Winsize);

/// Master/slave pair with the slave already in raw mode
pub struct PtyPair {
    pub master: OwnedFd,
    pub slave: OwnedFd,
}

fn winsize(size: TermSize) -> Winsize {
    Winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.xpixel,
        ws_ypixel: size.ypixel,
    }
}

/// Allocate a pty pair sized to the request and put the slave into raw
/// mode: echo, canonical line buffering, and output post-processing all
/// off, so the child's byte stream crosses the wire unmodified.
pub fn open_raw_pty(size: TermSize) -> AgentResult<PtyPair> {
    let ends = openpty(Some(&winsize(size)), None::<&nix::sys::termios::Termios>)
        .map_err(|e| AgentError::PtyAllocation(e.to_string()))?;

    let mut termios =
        tcgetattr(&ends.slave).map_err(|e| AgentError::PtyAllocation(e.to_string()))?;
    cfmakeraw(&mut termios);
    tcsetattr(&ends.slave, SetArg::TCSANOW, &termios)
        .map_err(|e| AgentError::PtyAllocation(e.to_string()))?;

    Ok(PtyPair {
        master: ends.master,
        slave: ends.slave,
    })
}

/// Put the master side into non-blocking mode. Input writes from the
/// dispatcher share this fd with the supervisor's read pump; neither may
/// ever block on it, or every command behind the blocked one stalls.
pub(super) fn set_nonblocking(master: &File) -> nix::Result<()> {
    let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(master.as_raw_fd(), FcntlArg::F_SETFL(flags)).map(drop)
}

/// Apply a new window size to the terminal behind the master side.
pub fn resize_terminal(master: &File, size: TermSize) -> nix::Result<()> {
    let ws = winsize(size);
    unsafe { tiocswinsz(master.as_raw_fd(), &ws) }.map(drop)
}

/// Wait up to `timeout` for the master side to have output pending.
/// Hangup and error conditions count as readable so the pump observes
/// EOF instead of sleeping through it.
pub(super) fn wait_readable(master: &File, timeout: PollTimeout) -> bool {
    let mut fds = [PollFd::new(master.as_fd(), PollFlags::POLLIN)];
    loop {
        match poll(&mut fds, timeout) {
            Ok(0) => return false,
            Ok(_) => {
                return fds[0]
                    .revents()
                    .map(|r| {
                        r.intersects(
                            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR,
                        )
                    })
                    .unwrap_or(false)
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => return false,
        }
    }
}
