//! The SIGCHLD side of the job table.
//!
//! The handler runs between any two instructions of the shell, so it is
//! limited to operations that are async-signal-safe: `waitpid` and stores to
//! the static cells below. Allocation, locking and printing all happen later,
//! when the prompt loop calls [`drain_status_reports`].

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use crate::cutils::{errno, set_errno};
use crate::system::signal::SignalNumber;
use crate::system::wait::{Wait, WaitError, WaitEvent, WaitOptions};
use crate::system::{ProcessId, ANY_CHILD};

use super::{JobId, JobState, JobTable};

/// Upper bound on simultaneously tracked jobs.
pub(crate) const MAX_JOBS: usize = 64;

const VACANT: i32 = 0;
// Claimed but not yet published. Reaped pids are positive, so the handler
// can never match this value.
const RESERVED: i32 = -1;

struct StateCell {
    pgid: AtomicI32,
    state: AtomicU8,
}

const VACANT_CELL: StateCell = StateCell {
    pgid: AtomicI32::new(VACANT),
    state: AtomicU8::new(0),
};

/// The slice of job state shared with the handler. A table row holds an
/// index into this array and reads its state back through it.
static STATE_CELLS: [StateCell; MAX_JOBS] = [VACANT_CELL; MAX_JOBS];

/// Raised by the handler whenever it recorded something, lowered by the
/// drain. Everything the drain does is driven by this single flag.
static STATE_CHANGED: AtomicBool = AtomicBool::new(false);

/// Reserve a free cell for a new job. The initial state is in place before
/// the process group is published, so a report arriving mid-claim cannot be
/// overwritten afterwards.
pub(super) fn claim_cell(pgid: ProcessId, state: JobState) -> Option<usize> {
    for (index, cell) in STATE_CELLS.iter().enumerate() {
        if cell
            .pgid
            .compare_exchange(VACANT, RESERVED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            cell.state.store(state.as_raw(), Ordering::SeqCst);
            cell.pgid.store(pgid, Ordering::SeqCst);
            return Some(index);
        }
    }
    None
}

pub(super) fn release_cell(index: usize) {
    STATE_CELLS[index].pgid.store(VACANT, Ordering::SeqCst);
}

pub(super) fn load_state(index: usize) -> JobState {
    JobState::from_raw(STATE_CELLS[index].state.load(Ordering::SeqCst))
}

pub(super) fn store_state(index: usize, state: JobState) {
    STATE_CELLS[index].state.store(state.as_raw(), Ordering::SeqCst);
}

/// Return every cell to the vacant state and drop any pending report.
/// Only meaningful in a forked child, which works on a private copy of
/// the statics.
#[cfg(test)]
fn clear_cells() {
    for cell in &STATE_CELLS {
        cell.state.store(JobState::Running.as_raw(), Ordering::SeqCst);
        cell.pgid.store(VACANT, Ordering::SeqCst);
    }
    STATE_CHANGED.store(false, Ordering::SeqCst);
}

/// Record one reaped status. A status counts for a job only when the reaped
/// pid is the job's group leader; reports for other pipeline members and for
/// foreground children the executor already waited on fall through silently.
fn post_status_report(pid: ProcessId, state: JobState) {
    for cell in &STATE_CELLS {
        if cell.pgid.load(Ordering::SeqCst) == pid {
            cell.state.store(state.as_raw(), Ordering::SeqCst);
            STATE_CHANGED.store(true, Ordering::SeqCst);
        }
    }
}

/// Collect every child status the kernel has queued for us.
pub(crate) extern "C" fn handle_sigchld(_signal: SignalNumber) {
    let saved_errno = errno();

    loop {
        let options = WaitOptions::new().no_hang().untraced().continued();
        match ANY_CHILD.wait(options) {
            Ok((pid, event)) => {
                let state = match event {
                    WaitEvent::Exited(_) | WaitEvent::Signaled(_) => JobState::Done,
                    WaitEvent::Stopped(_) => JobState::Stopped,
                    WaitEvent::Continued => JobState::Running,
                };
                post_status_report(pid, state);
            }
            Err(WaitError::NotReady) => break,
            Err(WaitError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => continue,
            // Includes `ECHILD` once every child has been collected.
            Err(WaitError::Io(_)) => break,
        }
    }

    set_errno(saved_errno);
}

/// Report newly finished background jobs and drop their rows. Called by the
/// prompt loop before each prompt; stop and continue transitions stay
/// silent here and surface through `jobs` instead.
pub(crate) fn drain_status_reports(table: &mut JobTable) {
    if !STATE_CHANGED.swap(false, Ordering::SeqCst) {
        return;
    }

    for notice in collect_done_notices(table) {
        println_ignore_io_error!("{notice}");
    }
}

fn collect_done_notices(table: &mut JobTable) -> Vec<String> {
    let finished: Vec<JobId> = table
        .iter()
        .filter(|job| job.state() == JobState::Done && !job.notified)
        .map(|job| job.id)
        .collect();

    let mut notices = Vec::with_capacity(finished.len());
    for id in finished {
        if let Some(job) = table.find_mut(id) {
            job.notified = true;
            notices.push(job.done_notice());
        }
        table.remove(id);
    }

    notices
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::{clear_cells, post_status_report, MAX_JOBS, STATE_CHANGED};
    use crate::common::Error;
    use crate::jobs::{JobState, JobTable};
    use crate::system::wait::{Wait, WaitEvent, WaitOptions};
    use crate::system::{ForkResult, _exit, fork};

    // The cells and the flag are process globals, so this is the one test
    // allowed to post and drain; splitting it up would race against itself.
    #[test]
    fn reports_flow_from_the_handler_side_to_the_drain() {
        let mut table = JobTable::new();
        let stopper = table
            .add(82001, "cat".to_string(), JobState::Running, vec![82001])
            .unwrap();
        let finisher = table
            .add(82002, "sleep 0".to_string(), JobState::Running, vec![82002])
            .unwrap();

        // A report for a pid that is not a group leader of ours changes
        // nothing.
        post_status_report(82003, JobState::Done);
        assert_eq!(table.find(stopper).unwrap().state(), JobState::Running);
        assert_eq!(table.find(finisher).unwrap().state(), JobState::Running);

        post_status_report(82001, JobState::Stopped);
        post_status_report(82002, JobState::Done);
        assert!(STATE_CHANGED.load(Ordering::SeqCst));
        assert_eq!(table.find(stopper).unwrap().state(), JobState::Stopped);

        // Only the finished job is reported and removed; the stopped one
        // keeps its row.
        let notices = super::collect_done_notices(&mut table);
        assert_eq!(notices, vec!["[2]+ Done        sleep 0".to_string()]);
        assert!(table.find(finisher).is_none());
        assert!(table.find(stopper).is_some());

        // Resuming reuses the same cell.
        post_status_report(82001, JobState::Running);
        assert_eq!(table.find(stopper).unwrap().state(), JobState::Running);

        // Nothing left to report.
        assert_eq!(super::collect_done_notices(&mut table), Vec::<String>::new());
    }

    // Exhausting the cell array would steal slots from tests running in
    // parallel threads, so the fill happens in a forked child that works
    // on its own copy of the statics.
    #[test]
    fn a_full_table_rejects_new_jobs_until_one_is_removed() {
        let ForkResult::Parent(child_pid) = fork().unwrap() else {
            clear_cells();
            let mut table = JobTable::new();

            // Jobs born stopped announce nothing, so the fill stays quiet.
            let first = table
                .add(84001, "sleep 0".to_string(), JobState::Stopped, vec![84001])
                .unwrap();
            for slot in 1..MAX_JOBS {
                let pgid = 84001 + slot as i32;
                table
                    .add(pgid, format!("sleep {slot}"), JobState::Stopped, vec![pgid])
                    .unwrap();
            }

            match table.add(84901, "sleep a".to_string(), JobState::Stopped, vec![84901]) {
                Err(err @ Error::JobTableFull) => {
                    if err.to_string() != "too many active jobs" {
                        _exit(2);
                    }
                }
                _ => _exit(3),
            }

            // Erasing one row frees its cell; ids still never go backwards.
            table.remove(first);
            match table.add(84902, "sleep b".to_string(), JobState::Stopped, vec![84902]) {
                Ok(id) if id as usize == MAX_JOBS + 1 => _exit(0),
                _ => _exit(4),
            }
        };

        let (_, event) = child_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(event, WaitEvent::Exited(0));
    }
}
