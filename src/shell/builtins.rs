//! `jobs`, `fg` and `bg`.
//!
//! These manipulate the job table instead of launching anything, so they
//! are dispatched by name before the executor gets a say. Extra arguments
//! beyond the job reference are ignored.

use crate::common::Error;
use crate::exec::terminal::JobControl;
use crate::exec::{self, ForegroundStatus};
use crate::jobs::{Job, JobId, JobState, JobTable};
use crate::log::dev_info;
use crate::system::killpg;
use crate::system::signal::consts::SIGCONT;

/// Print one line per live job.
pub(crate) fn jobs(table: &JobTable) {
    for line in table.listing() {
        println_ignore_io_error!("{line}");
    }
}

/// The job a `fg`/`bg` invocation refers to: an explicit `%N` or `N`
/// argument, or the current job when absent. The error carries the user's
/// own token so the diagnostic echoes it back.
fn resolve_job<'a>(
    table: &'a JobTable,
    builtin: &'static str,
    args: &[String],
) -> Result<&'a Job, Error> {
    let Some(token) = args.get(1) else {
        return table.most_recent().ok_or(Error::NoSuchJob {
            builtin,
            target: "current".to_string(),
        });
    };

    let no_such_job = || Error::NoSuchJob {
        builtin,
        target: token.clone(),
    };

    let id: JobId = token
        .strip_prefix('%')
        .unwrap_or(token)
        .parse()
        .map_err(|_| no_such_job())?;
    table.find(id).ok_or_else(no_such_job)
}

/// Bring a job to the foreground: resume it if it was stopped, hand it the
/// terminal and wait until it finishes or stops again.
pub(crate) fn foreground(
    table: &mut JobTable,
    control: &JobControl,
    args: &[String],
) -> Result<(), Error> {
    let job = resolve_job(table, "fg", args)?;
    let (id, pgid, stopped) = (job.id, job.pgid, job.state() == JobState::Stopped);

    table.mark_current(id);
    if let Some(job) = table.find(id) {
        // Echo what is being waited on, like the launch echo of a new
        // foreground command.
        println_ignore_io_error!("{}", job.command);
        dev_info!("foregrounding group {pgid} ({} processes)", job.pids.len());
    }

    let guard = control.transfer_terminal(pgid);
    if stopped {
        killpg(pgid, SIGCONT).map_err(|err| Error::Io(Some("killpg"), err))?;
    }
    table.set_state(id, JobState::Running);

    let status = exec::wait_for_group(pgid);
    drop(guard);

    match status {
        ForegroundStatus::Finished => table.remove(id),
        ForegroundStatus::Stopped => {
            table.set_state(id, JobState::Stopped);
            if let Some(job) = table.find(id) {
                println_ignore_io_error!("{}", job.stopped_notice());
            }
        }
    }

    Ok(())
}

/// Resume a stopped job without giving it the terminal. Refuses jobs that
/// are not stopped, leaving the table untouched.
pub(crate) fn background(table: &mut JobTable, args: &[String]) -> Result<(), Error> {
    let job = resolve_job(table, "bg", args)?;
    let (id, pgid, state) = (job.id, job.pgid, job.state());

    if state != JobState::Stopped {
        return Err(Error::NotStopped { builtin: "bg", id });
    }

    table.mark_current(id);
    if let Some(job) = table.find(id) {
        println_ignore_io_error!("{}", job.resume_notice());
    }

    killpg(pgid, SIGCONT).map_err(|err| Error::Io(Some("killpg"), err))?;
    table.set_state(id, JobState::Running);

    Ok(())
}
