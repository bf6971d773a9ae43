//! Signal dispositions, kept as RAII registrations.
use std::{io, mem::MaybeUninit};

use crate::cutils::cerr;
use libc::c_int;

pub(crate) type SignalNumber = c_int;

/// Handler function installed through [`SignalHandlerBehavior::Handler`].
///
/// It runs with every signal masked, and must restrict itself to
/// async-signal-safe work on top of that.
pub(crate) type SignalHandlerFn = extern "C" fn(SignalNumber);

pub(crate) enum SignalHandlerBehavior {
    Default,
    Ignore,
    Handler(SignalHandlerFn),
}

/// A registered signal disposition. Dropping this restores whatever
/// disposition the signal had before registration; [`SignalHandler::forget`]
/// makes the registration permanent instead.
pub(crate) struct SignalHandler {
    signal: SignalNumber,
    original: libc::sigaction,
}

impl SignalHandler {
    pub(crate) fn register(
        signal: SignalNumber,
        behavior: SignalHandlerBehavior,
    ) -> io::Result<Self> {
        let action = new_action(behavior)?;
        let original = install(signal, &action)?;

        Ok(Self { signal, original })
    }

    pub(crate) fn forget(self) {
        std::mem::forget(self)
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        install(self.signal, &self.original).ok();
    }
}

fn new_action(behavior: SignalHandlerBehavior) -> io::Result<libc::sigaction> {
    let sa_sigaction = match behavior {
        SignalHandlerBehavior::Default => libc::SIG_DFL,
        SignalHandlerBehavior::Ignore => libc::SIG_IGN,
        SignalHandlerBehavior::Handler(handler) => handler as libc::sighandler_t,
    };

    Ok(libc::sigaction {
        sa_sigaction,
        sa_mask: full_signal_set()?,
        // Restart interrupted reads; the prompt should not fail with EINTR
        // every time a child changes state mid-line.
        sa_flags: libc::SA_RESTART,
        sa_restorer: None,
    })
}

/// Swap in `action` and hand back the disposition it replaced.
fn install(signal: SignalNumber, action: &libc::sigaction) -> io::Result<libc::sigaction> {
    let mut original = MaybeUninit::<libc::sigaction>::zeroed();

    cerr(unsafe { libc::sigaction(signal, action, original.as_mut_ptr()) })?;

    // SAFETY: a successful sigaction filled in the old action.
    Ok(unsafe { original.assume_init() })
}

fn full_signal_set() -> io::Result<libc::sigset_t> {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();

    cerr(unsafe { libc::sigfillset(set.as_mut_ptr()) })?;

    // SAFETY: sigfillset initialized the set.
    Ok(unsafe { set.assume_init() })
}

// One list shared by the re-exports and the name table.
macro_rules! signal_table {
    ($($name:ident),+ $(,)?) => {
        pub(crate) mod consts {
            pub(crate) use libc::{$($name,)+};
        }

        /// Symbolic signal name, for log lines and wait event debugging.
        pub(crate) fn signal_name(signal: SignalNumber) -> &'static str {
            match signal {
                $(consts::$name => stringify!($name),)+
                _ => "unknown signal",
            }
        }
    };
}

signal_table! {
    SIGINT,
    SIGQUIT,
    SIGTSTP,
    SIGCHLD,
    SIGCONT,
    SIGTTIN,
    SIGTTOU,
    SIGKILL,
    SIGSTOP,
    SIGUSR1,
    SIGUSR2,
}
