use std::io;

#[cfg(feature = "dev")]
use std::fs::File;

use log::Log;

use self::simple_logger::SimpleLogger;

mod simple_logger;

pub(crate) const USER_TARGET: &str = "tinyshell::user";
pub(crate) const DEV_TARGET: &str = "tinyshell::dev";

/// Messages for the person at the prompt; they come out on stderr behind
/// the shell prefix.
macro_rules! user_error {
    ($($arg:tt)+) => {
        ::log::error!(target: crate::log::USER_TARGET, $($arg)+)
    };
}
pub(crate) use user_error;

/// Tracing for whoever works on the shell itself. The call sites are
/// compiled under every configuration so they stay type-checked, but the
/// records only go anywhere with the `dev` feature enabled.
macro_rules! dev_warn {
    ($($arg:tt)+) => {
        if std::cfg!(feature = "dev") {
            ::log::warn!(
                target: crate::log::DEV_TARGET,
                "{}: {}",
                std::panic::Location::caller(),
                format_args!($($arg)+)
            )
        }
    };
}
pub(crate) use dev_warn;

macro_rules! dev_info {
    ($($arg:tt)+) => {
        if std::cfg!(feature = "dev") {
            ::log::info!(
                target: crate::log::DEV_TARGET,
                "{}: {}",
                std::panic::Location::caller(),
                format_args!($($arg)+)
            )
        }
    };
}
pub(crate) use dev_info;

/// Routes records by target: user messages to stderr and, when the `dev`
/// feature is on, developer tracing to a log file. Records addressed to
/// neither target are dropped.
pub struct ShellLogger {
    user: SimpleLogger<io::Stderr>,
    #[cfg(feature = "dev")]
    dev: SimpleLogger<File>,
}

impl ShellLogger {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            user: SimpleLogger::to_stderr(prefix),
            #[cfg(feature = "dev")]
            dev: SimpleLogger::to_file(dev_log_path(), "")
                .expect("could not open the dev log file"),
        }
    }

    pub fn into_global_logger(self) {
        log::set_boxed_logger(Box::new(self))
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .expect("a logger was already installed");
    }
}

#[cfg(feature = "dev")]
fn dev_log_path() -> std::path::PathBuf {
    option_env!("TINYSHELL_DEV_LOGS")
        .map(Into::into)
        .unwrap_or_else(|| {
            std::env::temp_dir().join(format!("tinyshell-dev-{}.log", std::process::id()))
        })
}

impl Log for ShellLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.user.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        match record.target() {
            USER_TARGET => self.user.log(record),
            #[cfg(feature = "dev")]
            DEV_TARGET => self.dev.log(record),
            _ => {}
        }
    }

    fn flush(&self) {
        self.user.flush();
        #[cfg(feature = "dev")]
        self.dev.flush();
    }
}
