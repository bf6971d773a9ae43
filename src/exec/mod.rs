#![deny(unsafe_code)]

//! Launching pipelines and waiting on their process groups.
//!
//! Every stage of a pipeline runs in its own forked process; the first
//! stage leads a fresh process group and the rest join it, so a
//! terminal-generated interrupt or suspend reaches the whole pipeline and
//! never the shell. All child-side failures end in `_exit`; the only
//! errors reported here are the shell's own resource failures.

pub(crate) mod terminal;

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::common::{resolve::resolve_command, Error};
use crate::jobs::{JobState, JobTable};
use crate::log::dev_info;
use crate::shell::parser::{CommandSpec, Pipeline, RedirectMode};
use crate::system::wait::{Wait, WaitError, WaitEvent, WaitOptions};
use crate::system::{
    ForkResult, ProcessId, _exit, close, dup2, execv, fork, getpid, pipe, setpgid,
};

use self::terminal::JobControl;

/// How a foreground wait ended.
pub(crate) enum ForegroundStatus {
    /// No waitable process is left in the group.
    Finished,
    /// A member of the group was suspended.
    Stopped,
}

/// Fork and exec every stage of `pipeline`, then either register it as a
/// background job or wait for it in the foreground.
pub(crate) fn run_pipeline(
    table: &mut JobTable,
    control: &JobControl,
    pipeline: &Pipeline,
) -> Result<(), Error> {
    let stage_count = pipeline.stages.len();
    if stage_count == 0 {
        return Ok(());
    }

    let mut pipes = Vec::with_capacity(stage_count - 1);
    for _ in 1..stage_count {
        pipes.push(pipe().map_err(|err| Error::Io(Some("pipe"), err))?);
    }

    let mut pgid = 0;
    let mut pids = Vec::with_capacity(stage_count);

    for (index, stage) in pipeline.stages.iter().enumerate() {
        match fork().map_err(|err| Error::Io(Some("fork"), err))? {
            ForkResult::Child => exec_stage(
                stage,
                index,
                stage_count,
                pgid,
                &pipes,
                pipeline.background,
                control,
            ),
            ForkResult::Parent(pid) => {
                if pgid == 0 {
                    pgid = pid;
                }
                // The child runs the same call on itself; whichever side
                // wins, the group is in place before anyone relies on it.
                setpgid(pid, pgid).ok();
                pids.push(pid);
            }
        }
    }

    // Closes every pipe fd on the shell's side. Readers see EOF once the
    // writing stages are gone.
    drop(pipes);

    dev_info!("launched {pids:?} as process group {pgid}");

    if pipeline.background {
        table.add(pgid, pipeline.command_text(), JobState::Running, pids)?;
        return Ok(());
    }

    let guard = control.transfer_terminal(pgid);
    let status = wait_for_group(pgid);
    drop(guard);

    if let ForegroundStatus::Stopped = status {
        table.add(pgid, pipeline.command_text(), JobState::Stopped, pids)?;
        if let Some(job) = table.find_by_pgid(pgid) {
            println_ignore_io_error!("{}", job.stopped_notice());
        }
    }

    Ok(())
}

/// Block until the group stops or has no waitable member left. Exit
/// statuses of individual members are collected and discarded along the
/// way.
pub(crate) fn wait_for_group(pgid: ProcessId) -> ForegroundStatus {
    loop {
        match (-pgid).wait(WaitOptions::new().untraced()) {
            Ok((_, WaitEvent::Stopped(_))) => return ForegroundStatus::Stopped,
            Ok(_) => {}
            Err(WaitError::Io(err)) if was_interrupted(&err) => {}
            // Includes `ECHILD` once the whole group has been collected.
            Err(_) => return ForegroundStatus::Finished,
        }
    }
}

fn was_interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

/// Child-side half of a stage launch. Joins the job's process group, wires
/// up pipes and redirections, resolves the program and replaces the image.
/// Never returns.
fn exec_stage(
    stage: &CommandSpec,
    index: usize,
    stage_count: usize,
    pgid: ProcessId,
    pipes: &[(OwnedFd, OwnedFd)],
    background: bool,
    control: &JobControl,
) -> ! {
    // Group membership must be in place before the exec. The leader gets
    // `pgid == 0` and founds the group under its own pid.
    let pgid = if pgid == 0 { getpid() } else { pgid };
    let _ = setpgid(0, pgid);

    if !background && index == 0 {
        control.claim_terminal_from_child(pgid);
    }

    // The shell's dispositions must not leak into the program.
    terminal::reset_child_signals();

    if index > 0 {
        let (read_end, _) = &pipes[index - 1];
        let _ = dup2(read_end.as_raw_fd(), libc::STDIN_FILENO);
    }
    if index + 1 < stage_count {
        let (_, write_end) = &pipes[index];
        let _ = dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO);
    }

    // Every inherited pipe fd has to go, used or not; a stray write end
    // would keep a downstream reader from ever seeing EOF. Raw closes, as
    // the fds are owned by the parent and this process never unwinds.
    for (read_end, write_end) in pipes {
        let _ = close(read_end.as_raw_fd());
        let _ = close(write_end.as_raw_fd());
    }

    if let Some(path) = &stage.stdin_from {
        match File::open(path) {
            Ok(file) => {
                let _ = dup2(file.as_raw_fd(), libc::STDIN_FILENO);
            }
            Err(_) => {
                eprintln_ignore_io_error!("tinyshell: cannot open input file");
                _exit(1);
            }
        }
    }
    if let Some((path, mode)) = &stage.stdout_to {
        match open_sink(path, *mode) {
            Ok(file) => {
                let _ = dup2(file.as_raw_fd(), libc::STDOUT_FILENO);
            }
            Err(_) => {
                eprintln_ignore_io_error!("tinyshell: cannot open output file");
                _exit(1);
            }
        }
    }
    if let Some((path, mode)) = &stage.stderr_to {
        match open_sink(path, *mode) {
            Ok(file) => {
                let _ = dup2(file.as_raw_fd(), libc::STDERR_FILENO);
            }
            Err(_) => {
                eprintln_ignore_io_error!("tinyshell: cannot open error file");
                _exit(1);
            }
        }
    }

    let Some(program) = resolve_command(&stage.args[0]) else {
        eprintln_ignore_io_error!("tinyshell: command not found: {}", stage.args[0]);
        _exit(127);
    };

    let err = execv(&program, &stage.args);
    eprintln_ignore_io_error!("tinyshell: {}: {err}", stage.args[0]);
    _exit(1);
}

fn open_sink(path: &Path, mode: RedirectMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    match mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };
    options.open(path)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::ErrorKind;
    use std::time::{Duration, Instant};

    use crate::jobs::{JobState, JobTable};
    use crate::shell::parser::parse;
    use crate::system::signal::consts::SIGKILL;
    use crate::system::wait::{Wait, WaitError, WaitOptions};
    use crate::system::{getpgid, killpg};

    use super::{run_pipeline, terminal::JobControl};

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tinyshell-test-{}-{name}", std::process::id()))
    }

    /// Read a file that a freshly forked pipeline is still writing.
    fn wait_for_contents(path: &std::path::Path, expected: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let contents = fs::read_to_string(path).unwrap_or_default();
            if contents == expected || Instant::now() > deadline {
                return contents;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn pipeline_stages_share_one_group_led_by_the_first() {
        let mut table = JobTable::new();
        let control = JobControl::inert();

        let pipeline = parse("sleep 5 | sleep 5 | sleep 5 &");
        run_pipeline(&mut table, &control, &pipeline).unwrap();

        let job = table.most_recent().unwrap();
        assert_eq!(job.pids.len(), 3);
        assert_eq!(job.pgid, job.pids[0]);
        assert_eq!(job.state(), JobState::Running);
        for pid in &job.pids {
            assert_eq!(getpgid(*pid).unwrap(), job.pgid);
        }

        let pgid = job.pgid;
        killpg(pgid, SIGKILL).unwrap();
        // Reap all three so they do not linger as zombies.
        loop {
            match (-pgid).wait(WaitOptions::new()) {
                Ok(_) => {}
                Err(WaitError::Io(err)) if err.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    }

    #[test]
    fn pipeline_output_flows_between_stages() {
        let out = scratch_path("pipe-output");
        let mut table = JobTable::new();
        let control = JobControl::inert();

        let line = format!("echo hello | tr a-z A-Z > {}", out.display());
        run_pipeline(&mut table, &control, &parse(&line)).unwrap();

        // Foreground run: both stages were already waited on.
        assert!(table.is_empty());
        assert_eq!(wait_for_contents(&out, "HELLO\n"), "HELLO\n");
        fs::remove_file(&out).unwrap();
    }

    #[test]
    fn missing_program_reports_and_exits_127() {
        let err = scratch_path("missing-program");
        let mut table = JobTable::new();
        let control = JobControl::inert();

        let line = format!("this-program-does-not-exist 2> {}", err.display());
        run_pipeline(&mut table, &control, &parse(&line)).unwrap();

        let contents = wait_for_contents(
            &err,
            "tinyshell: command not found: this-program-does-not-exist\n",
        );
        assert_eq!(
            contents,
            "tinyshell: command not found: this-program-does-not-exist\n"
        );
        fs::remove_file(&err).unwrap();
    }

    #[test]
    fn input_redirection_feeds_the_first_stage() {
        let input = scratch_path("redirect-in");
        let out = scratch_path("redirect-out");
        fs::write(&input, "3\n1\n2\n").unwrap();

        let mut table = JobTable::new();
        let control = JobControl::inert();

        let line = format!("sort < {} > {}", input.display(), out.display());
        run_pipeline(&mut table, &control, &parse(&line)).unwrap();

        assert_eq!(wait_for_contents(&out, "1\n2\n3\n"), "1\n2\n3\n");
        fs::remove_file(&input).unwrap();
        fs::remove_file(&out).unwrap();
    }

    #[test]
    fn append_redirection_keeps_existing_contents() {
        let out = scratch_path("append-out");
        fs::write(&out, "first\n").unwrap();

        let mut table = JobTable::new();
        let control = JobControl::inert();

        let line = format!("echo second >> {}", out.display());
        run_pipeline(&mut table, &control, &parse(&line)).unwrap();

        assert_eq!(wait_for_contents(&out, "first\nsecond\n"), "first\nsecond\n");
        fs::remove_file(&out).unwrap();
    }
}
