//! Terminal ownership and process-group setup for the shell itself.

use std::io::stdin;

use crate::common::Error;
use crate::cutils::safe_isatty;
use crate::jobs::reaper;
use crate::log::dev_warn;
use crate::system::signal::{
    consts::*, SignalHandler, SignalHandlerBehavior, SignalNumber,
};
use crate::system::term::Terminal;
use crate::system::{getpgrp, getpid, kill, setpgid, ProcessId};

/// Dispositions the shell overrides while interactive. Children must get
/// the defaults back before exec.
const JOB_CONTROL_SIGNALS: [SignalNumber; 6] =
    [SIGINT, SIGQUIT, SIGTSTP, SIGTTIN, SIGTTOU, SIGCHLD];

/// Process-wide terminal state, set up once before the first prompt.
pub(crate) struct JobControl {
    pub(crate) interactive: bool,
    pub(crate) shell_pgid: ProcessId,
    /// Kept alive for the whole session so the original dispositions are
    /// restored if the shell is ever torn down early.
    _handlers: Vec<SignalHandler>,
}

impl JobControl {
    /// Probe stdin and, if it is a terminal, take control of it: wait until
    /// the shell is in the foreground, install the shell's dispositions,
    /// move into a fresh process group and claim the terminal for it.
    ///
    /// Without a terminal none of that happens and job control is inert:
    /// pipelines still run, but no handlers are installed and the terminal
    /// is never touched.
    pub(crate) fn init() -> Result<Self, Error> {
        if !safe_isatty(libc::STDIN_FILENO) {
            return Ok(Self {
                interactive: false,
                shell_pgid: getpgrp(),
                _handlers: Vec::new(),
            });
        }

        // If we were started in the background, stop until the launching
        // shell hands us the terminal. SIGTTIN still has its default
        // disposition here, which is exactly what makes this work.
        loop {
            let foreground_pgid = stdin()
                .tcgetpgrp()
                .map_err(|err| Error::Io(Some("tcgetpgrp"), err))?;
            let shell_pgid = getpgrp();
            if foreground_pgid == shell_pgid {
                break;
            }
            kill(-shell_pgid, SIGTTIN).map_err(|err| Error::Io(Some("kill"), err))?;
        }

        let mut handlers = Vec::with_capacity(JOB_CONTROL_SIGNALS.len());
        for signal in JOB_CONTROL_SIGNALS {
            let behavior = if signal == SIGCHLD {
                SignalHandlerBehavior::Handler(reaper::handle_sigchld)
            } else {
                // Interrupt and suspend are for the foreground job, never
                // for the shell.
                SignalHandlerBehavior::Ignore
            };
            let handler = SignalHandler::register(signal, behavior)
                .map_err(|err| Error::Io(Some("sigaction"), err))?;
            handlers.push(handler);
        }

        let shell_pgid = getpid();
        setpgid(shell_pgid, shell_pgid).map_err(Error::ProcessGroup)?;

        stdin()
            .tcsetpgrp(shell_pgid)
            .map_err(|err| Error::Io(Some("tcsetpgrp"), err))?;

        Ok(Self {
            interactive: true,
            shell_pgid,
            _handlers: handlers,
        })
    }

    /// A non-interactive instance that never touches the terminal and has
    /// no handlers installed, so tests can drive the executor without
    /// having their own child bookkeeping interfered with.
    #[cfg(test)]
    pub(crate) fn inert() -> Self {
        Self {
            interactive: false,
            shell_pgid: getpgrp(),
            _handlers: Vec::new(),
        }
    }

    /// Hand the terminal to a job's process group for the duration of a
    /// foreground wait. The guard gives it back on every exit path. Both
    /// directions are no-ops without a terminal.
    pub(crate) fn transfer_terminal(&self, pgid: ProcessId) -> ForegroundGuard<'_> {
        if self.interactive {
            if let Err(err) = stdin().tcsetpgrp(pgid) {
                dev_warn!("cannot put group {pgid} in the foreground: {err}");
            }
        }
        ForegroundGuard { control: self }
    }

    /// Child-side half of the terminal transfer, run between fork and exec
    /// by the leader of a foreground job. Racing the parent's
    /// [`JobControl::transfer_terminal`] is harmless as both sides request
    /// the same owner.
    pub(crate) fn claim_terminal_from_child(&self, pgid: ProcessId) {
        if self.interactive {
            let _ = stdin().tcsetpgrp(pgid);
        }
    }
}

/// Restores terminal ownership to the shell when dropped.
#[must_use = "the terminal is returned to the shell when the guard drops"]
pub(crate) struct ForegroundGuard<'a> {
    control: &'a JobControl,
}

impl Drop for ForegroundGuard<'_> {
    fn drop(&mut self) {
        if self.control.interactive {
            if let Err(err) = stdin().tcsetpgrp(self.control.shell_pgid) {
                dev_warn!("cannot return the terminal to the shell: {err}");
            }
        }
    }
}

/// Give every job-control signal its default disposition again. Runs in
/// children between fork and exec; the registrations are deliberately
/// leaked since the child's image is about to be replaced.
pub(crate) fn reset_child_signals() {
    for signal in JOB_CONTROL_SIGNALS {
        if let Ok(handler) = SignalHandler::register(signal, SignalHandlerBehavior::Default) {
            handler.forget();
        }
    }
}
