use std::{io, os::fd::AsRawFd};

#[cfg(test)]
use std::{
    fs::File,
    os::fd::{FromRawFd, OwnedFd},
    ptr::null_mut,
};

use crate::cutils::cerr;

use super::ProcessId;

mod sealed {
    use std::os::fd::AsRawFd;

    pub(crate) trait Sealed {}

    impl<F: AsRawFd> Sealed for F {}
}

/// Job-control operations on a terminal file descriptor.
pub(crate) trait Terminal: sealed::Sealed {
    fn tcgetpgrp(&self) -> io::Result<ProcessId>;
    fn tcsetpgrp(&self, pgrp: ProcessId) -> io::Result<()>;
    #[cfg(test)]
    fn make_controlling_terminal(&self) -> io::Result<()>;
}

impl<F: AsRawFd> Terminal for F {
    /// The process group the terminal currently delivers keystroke signals
    /// to.
    fn tcgetpgrp(&self) -> io::Result<ProcessId> {
        cerr(unsafe { libc::tcgetpgrp(self.as_raw_fd()) })
    }

    /// Hand the terminal to `pgrp`. Callers outside the foreground group
    /// get `SIGTTOU` unless they ignore it.
    fn tcsetpgrp(&self, pgrp: ProcessId) -> io::Result<()> {
        cerr(unsafe { libc::tcsetpgrp(self.as_raw_fd(), pgrp) }).map(|_| ())
    }

    /// Adopt this terminal as the controlling terminal of our session.
    #[cfg(test)]
    fn make_controlling_terminal(&self) -> io::Result<()> {
        cerr(unsafe { libc::ioctl(self.as_raw_fd(), libc::TIOCSCTTY, 0) })?;
        Ok(())
    }
}

/// A pseudoterminal pair. The shell never allocates one at runtime; tests
/// do, to stand in for a real controlling terminal.
#[cfg(test)]
pub(crate) struct Pty {
    pub(crate) leader: File,
    pub(crate) follower: File,
}

#[cfg(test)]
impl Pty {
    pub(crate) fn open() -> io::Result<Self> {
        let (mut leader, mut follower) = (0, 0);

        cerr(unsafe {
            libc::openpty(
                &mut leader,
                &mut follower,
                null_mut::<libc::c_char>(),
                null_mut::<libc::termios>(),
                null_mut::<libc::winsize>(),
            )
        })?;

        // SAFETY: on success openpty handed us two fresh descriptors that
        // nothing else owns yet.
        let own = |fd| File::from(unsafe { OwnedFd::from_raw_fd(fd) });

        Ok(Self {
            leader: own(leader),
            follower: own(follower),
        })
    }
}
