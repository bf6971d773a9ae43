use crate::jobs::JobId;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A job reference (`%N`, `N` or the implicit current job) named no live job.
    NoSuchJob {
        builtin: &'static str,
        target: String,
    },
    /// `bg` was pointed at a job that is not stopped.
    NotStopped {
        builtin: &'static str,
        id: JobId,
    },
    /// All job slots are taken; the launched processes run untracked.
    JobTableFull,
    /// The shell could not move itself into its own process group at startup.
    ProcessGroup(std::io::Error),
    Io(Option<&'static str>, std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoSuchJob { builtin, target } => {
                write!(f, "{builtin}: {target}: no such job")
            }
            Error::NotStopped { builtin, id } => {
                write!(f, "{builtin}: job {id} already in background")
            }
            Error::JobTableFull => f.write_str("too many active jobs"),
            Error::ProcessGroup(e) => {
                write!(f, "couldn't put the shell in its own process group: {e}")
            }
            Error::Io(context, e) => {
                if let Some(what) = context {
                    write!(f, "{what} failed: {e}")
                } else {
                    write!(f, "IO error: {e}")
                }
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(None, err)
    }
}
