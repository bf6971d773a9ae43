//! Book-keeping for launched pipelines.
//!
//! The table owns one row per live job. The part of a row that the SIGCHLD
//! handler needs to see, the pair of process group and state, lives in a
//! bounded static cell array managed by [`reaper`]; a row only stores the
//! index of its cell. Everything else is plain owned data.

use std::fmt;

use crate::common::Error;
use crate::system::ProcessId;

pub(crate) mod reaper;

pub(crate) type JobId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    Running,
    Stopped,
    Done,
}

impl JobState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        }
    }

    fn as_raw(self) -> u8 {
        match self {
            JobState::Running => 0,
            JobState::Stopped => 1,
            JobState::Done => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => JobState::Stopped,
            2 => JobState::Done,
            _ => JobState::Running,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) pgid: ProcessId,
    /// Every process launched for this job, leader first.
    pub(crate) pids: Vec<ProcessId>,
    pub(crate) command: String,
    current: bool,
    notified: bool,
    cell: usize,
}

impl Job {
    pub(crate) fn state(&self) -> JobState {
        reaper::load_state(self.cell)
    }

    #[cfg(test)]
    pub(crate) fn is_current(&self) -> bool {
        self.current
    }

    fn sigil(&self) -> char {
        if self.current {
            '+'
        } else {
            '-'
        }
    }

    /// One `jobs` listing line. The state field is padded to 12 columns and
    /// running jobs carry the trailing ` &`.
    pub(crate) fn listing_line(&self) -> String {
        let state = self.state();
        let suffix = if state == JobState::Running { " &" } else { "" };
        format!(
            "[{}]{} {:<12}{}{}",
            self.id,
            self.sigil(),
            state,
            self.command,
            suffix
        )
    }

    /// Notice printed when a foreground job is suspended. The leading
    /// newline moves past the interrupted command's output.
    pub(crate) fn stopped_notice(&self) -> String {
        format!("\n[{}]{} Stopped         {}", self.id, self.sigil(), self.command)
    }

    /// Notice printed by the drain once a background job has finished.
    pub(crate) fn done_notice(&self) -> String {
        format!("[{}]{} Done        {}", self.id, self.sigil(), self.command)
    }

    /// Notice printed by `bg` when resuming a stopped job.
    pub(crate) fn resume_notice(&self) -> String {
        format!("[{}]{} {} &", self.id, self.sigil(), self.command)
    }
}

pub(crate) struct JobTable {
    jobs: Vec<Job>,
    next_id: JobId,
}

impl JobTable {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// Insert a newly launched job and make it the current one. Background
    /// launches announce themselves with the `[id] pgid` line; a job born
    /// stopped stays silent here, the stop notice covers it.
    pub(crate) fn add(
        &mut self,
        pgid: ProcessId,
        command: String,
        state: JobState,
        pids: Vec<ProcessId>,
    ) -> Result<JobId, Error> {
        let cell = reaper::claim_cell(pgid, state).ok_or(Error::JobTableFull)?;

        let id = self.next_id;
        self.next_id += 1;

        for job in &mut self.jobs {
            job.current = false;
        }

        let job = Job {
            id,
            pgid,
            pids,
            command,
            current: true,
            notified: false,
            cell,
        };

        if state == JobState::Running {
            println_ignore_io_error!("[{}] {}", job.id, job.pgid);
        }

        self.jobs.push(job);
        Ok(id)
    }

    /// Erase a job. If it was the current one, the most recently added of
    /// the remaining jobs takes over that role.
    pub(crate) fn remove(&mut self, id: JobId) {
        let Some(index) = self.jobs.iter().position(|job| job.id == id) else {
            return;
        };

        let job = self.jobs.remove(index);
        reaper::release_cell(job.cell);

        if job.current {
            if let Some(last) = self.jobs.last_mut() {
                last.current = true;
            }
        }
    }

    pub(crate) fn find(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    fn find_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    pub(crate) fn find_by_pgid(&self, pgid: ProcessId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.pgid == pgid)
    }

    pub(crate) fn set_state(&mut self, id: JobId, state: JobState) {
        if let Some(job) = self.find_mut(id) {
            reaper::store_state(job.cell, state);
        }
    }

    /// The job that `fg` and `bg` act on when no explicit reference is
    /// given: the current job, or failing that the last one added.
    pub(crate) fn most_recent(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|job| job.current)
            .or_else(|| self.jobs.last())
    }

    pub(crate) fn mark_current(&mut self, id: JobId) {
        if self.find(id).is_none() {
            return;
        }
        for job in &mut self.jobs {
            job.current = job.id == id;
        }
    }

    /// Listing lines for the `jobs` builtin; finished jobs are left to the
    /// drain and do not show up here.
    pub(crate) fn listing(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| job.state() != JobState::Done)
            .map(Job::listing_line)
            .collect()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.jobs.iter()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Drop for JobTable {
    fn drop(&mut self) {
        for job in &self.jobs {
            reaper::release_cell(job.cell);
        }
    }
}
