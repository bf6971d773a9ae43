use std::io;

use libc::{c_int, WCONTINUED, WNOHANG, WUNTRACED};

use crate::cutils::cerr;
use crate::system::signal::signal_name;
use crate::system::{signal::SignalNumber, ProcessId};

mod sealed {
    pub(crate) trait Sealed {}

    impl Sealed for crate::system::ProcessId {}
}

pub(crate) trait Wait: sealed::Sealed {
    /// Wait until a child changes state and report what happened to it.
    ///
    /// The target follows `waitpid` conventions: a positive value names one
    /// child, a negative value selects every member of that process group,
    /// and [`ANY_CHILD`](crate::system::ANY_CHILD) matches any child at all.
    fn wait(self, options: WaitOptions) -> Result<(ProcessId, WaitEvent), WaitError>;
}

impl Wait for ProcessId {
    fn wait(self, options: WaitOptions) -> Result<(ProcessId, WaitEvent), WaitError> {
        let mut status: c_int = 0;

        let pid = cerr(unsafe { libc::waitpid(self, &mut status, options.flags) })
            .map_err(WaitError::Io)?;

        if pid == 0 && options.flags & WNOHANG != 0 {
            return Err(WaitError::NotReady);
        }

        Ok((pid, WaitEvent::decode(status)))
    }
}

#[derive(Debug)]
pub enum WaitError {
    /// Nothing to report yet. Only seen with [`WaitOptions::no_hang`].
    NotReady,
    Io(io::Error),
}

pub struct WaitOptions {
    flags: c_int,
}

impl WaitOptions {
    /// Block until a child terminates.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Never block; report [`WaitError::NotReady`] instead.
    pub const fn no_hang(mut self) -> Self {
        self.flags |= WNOHANG;
        self
    }

    /// Also report children stopped by a signal.
    pub const fn untraced(mut self) -> Self {
        self.flags |= WUNTRACED;
        self
    }

    /// Also report stopped children that were resumed.
    pub const fn continued(mut self) -> Self {
        self.flags |= WCONTINUED;
        self
    }
}

/// A single state change of one child, decoded from the raw wait status.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    /// The child terminated of its own accord, with this exit status.
    Exited(c_int),
    /// The child was terminated by this signal.
    Signaled(SignalNumber),
    /// The child was stopped by this signal and can be resumed later.
    Stopped(SignalNumber),
    /// A stopped child was resumed by `SIGCONT`.
    Continued,
}

impl WaitEvent {
    // The four tests are mutually exclusive for any status `waitpid`
    // produces under the flags we pass, so the fallthrough is Continued.
    fn decode(status: c_int) -> Self {
        if libc::WIFEXITED(status) {
            Self::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Self::Signaled(libc::WTERMSIG(status))
        } else if libc::WIFSTOPPED(status) {
            Self::Stopped(libc::WSTOPSIG(status))
        } else {
            Self::Continued
        }
    }
}

impl std::fmt::Debug for WaitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Exited(status) => write!(f, "Exited({status})"),
            Self::Signaled(signal) => write!(f, "Signaled({})", signal_name(signal)),
            Self::Stopped(signal) => write!(f, "Stopped({})", signal_name(signal)),
            Self::Continued => f.write_str("Continued"),
        }
    }
}
