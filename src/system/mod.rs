use std::{
    ffi::CString,
    io,
    os::{
        fd::{FromRawFd, OwnedFd, RawFd},
        unix::prelude::OsStrExt,
    },
    path::Path,
};

use crate::cutils::cerr;

use self::signal::SignalNumber;

pub mod signal;

pub mod term;

pub mod wait;

pub(crate) type ProcessId = libc::pid_t;

/// Process ID argument that makes `waitpid` report on any child.
pub(crate) const ANY_CHILD: ProcessId = -1;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    /// In the parent, carrying the new child's pid.
    Parent(ProcessId),
    /// In the new child.
    Child,
}

unsafe fn inner_fork() -> io::Result<ForkResult> {
    Ok(match cerr(unsafe { libc::fork() })? {
        0 => ForkResult::Child,
        pid => ForkResult::Parent(pid),
    })
}

#[cfg(target_os = "linux")]
/// Create a new process.
pub(crate) fn fork() -> io::Result<ForkResult> {
    // SAFETY: Linux implements `fork` through `clone`, which keeps the call
    // sound even when other threads exist.
    unsafe { inner_fork() }
}

#[cfg(not(target_os = "linux"))]
/// Create a new process.
///
/// # Safety
///
/// If other threads exist, the child may only use async-signal-safe
/// functions until it reaches `execve` or `_exit`.
pub(crate) unsafe fn fork() -> io::Result<ForkResult> {
    inner_fork()
}

/// Detach into a fresh session. Fails if the caller already leads a
/// process group.
#[cfg(test)]
pub fn setsid() -> io::Result<ProcessId> {
    cerr(unsafe { libc::setsid() })
}

/// Our own process ID.
pub fn getpid() -> ProcessId {
    unsafe { libc::getpid() }
}

/// Send a signal to one process.
pub fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: a stale pid or bogus signal number comes back as ESRCH or
    // EINVAL, nothing worse.
    cerr(unsafe { libc::kill(pid, signal) }).map(|_| ())
}

/// Send a signal to every member of a process group.
pub fn killpg(pgid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: same contract as `kill`.
    cerr(unsafe { libc::killpg(pgid, signal) }).map(|_| ())
}

/// The process group we currently belong to.
pub fn getpgrp() -> ProcessId {
    unsafe { libc::getpgrp() }
}

/// The process group another process belongs to.
#[cfg(test)]
pub fn getpgid(pid: ProcessId) -> io::Result<ProcessId> {
    cerr(unsafe { libc::getpgid(pid) })
}

/// Move a process into a process group. Both arguments treat zero as
/// shorthand: `pid` zero means the caller, `pgid` zero founds a group
/// named after `pid`.
pub fn setpgid(pid: ProcessId, pgid: ProcessId) -> io::Result<()> {
    cerr(unsafe { libc::setpgid(pid, pgid) }).map(|_| ())
}

/// Create a pipe; returns the read and write ends in that order.
pub(crate) fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    cerr(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    // SAFETY: on success the kernel handed us two fresh descriptors, so
    // wrapping them transfers ownership exactly once.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Duplicate `from` onto the file descriptor number `to`.
pub(crate) fn dup2(from: RawFd, to: RawFd) -> io::Result<()> {
    cerr(unsafe { libc::dup2(from, to) }).map(|_| ())
}

/// Close a raw file descriptor. Used by pipeline children which must drop
/// every inherited pipe end before exec without running any `OwnedFd` drops.
pub(crate) fn close(fd: RawFd) -> io::Result<()> {
    cerr(unsafe { libc::close(fd) }).map(|_| ())
}

/// Replace the process image, inheriting the current environment.
/// Only returns if exec failed.
pub(crate) fn execv(path: &Path, args: &[String]) -> io::Error {
    let Ok(path) = CString::new(path.as_os_str().as_bytes()) else {
        return io::Error::from_raw_os_error(libc::EINVAL);
    };
    let args: Vec<CString> = match args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<_, _>>()
    {
        Ok(args) => args,
        Err(_) => return io::Error::from_raw_os_error(libc::EINVAL),
    };
    let mut argv: Vec<*const libc::c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
    argv.push(std::ptr::null());

    // SAFETY: `path` and every member of `argv` are NUL-terminated and live
    // until the call; the vector itself is NULL-terminated.
    unsafe { libc::execv(path.as_ptr(), argv.as_ptr()) };
    io::Error::last_os_error()
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        io::{Read, Write},
        os::unix::net::UnixStream,
        path::Path,
    };

    use libc::SIGKILL;

    use super::{
        fork, getpgid, getpgrp, getpid, setpgid,
        wait::{Wait, WaitEvent, WaitOptions},
        ForkResult, ProcessId,
    };

    #[test]
    fn children_can_be_moved_to_their_own_group() {
        let pgrp = getpgrp();
        assert_eq!(getpgid(0).unwrap(), pgrp);
        assert_eq!(getpgid(getpid()).unwrap(), pgrp);

        match fork().unwrap() {
            ForkResult::Child => {
                // Outlive the parent's asserts, then leave quietly.
                std::thread::sleep(std::time::Duration::from_secs(5));
                super::_exit(0);
            }
            ForkResult::Parent(child_pid) => {
                // A fresh child starts out in its parent's group.
                assert_eq!(getpgid(child_pid).unwrap(), pgrp);

                setpgid(child_pid, child_pid).unwrap();
                assert_eq!(getpgid(child_pid).unwrap(), child_pid);

                super::kill(child_pid, SIGKILL).unwrap();
                let (_, event) = child_pid.wait(WaitOptions::new()).unwrap();
                assert_eq!(event, WaitEvent::Signaled(SIGKILL));
            }
        }
    }

    #[test]
    fn kill_terminates_a_single_process() {
        let command = std::process::Command::new("sleep").arg("5").spawn().unwrap();
        let pid = command.id() as ProcessId;

        super::kill(pid, SIGKILL).unwrap();
        let (_, event) = pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(event, WaitEvent::Signaled(SIGKILL));
    }

    #[test]
    fn killpg_reaches_every_member_of_a_group() {
        // Each child writes a byte if it survives long enough; the group
        // kill must land first, so the socket reaches EOF unwritten.
        let (mut rx, mut tx) = UnixStream::pair().unwrap();

        let ForkResult::Parent(first) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(5));
            tx.write_all(&[0]).unwrap();
            super::_exit(0);
        };
        let ForkResult::Parent(second) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(5));
            tx.write_all(&[0]).unwrap();
            super::_exit(0);
        };
        drop(tx);

        setpgid(first, first).unwrap();
        setpgid(second, first).unwrap();
        super::killpg(first, SIGKILL).unwrap();

        assert_eq!(
            rx.read_exact(&mut [0; 2]).unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );

        for pid in [first, second] {
            let (_, event) = pid.wait(WaitOptions::new()).unwrap();
            assert_eq!(event, WaitEvent::Signaled(SIGKILL));
        }
    }

    #[test]
    fn pipe_carries_bytes() {
        let (rd, wr) = super::pipe().unwrap();
        let mut writer = File::from(wr);
        writer.write_all(b"ping").unwrap();
        drop(writer);

        let mut buf = Vec::new();
        File::from(rd).read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"ping");
    }

    #[test]
    fn execv_only_returns_on_failure() {
        let ForkResult::Parent(child_pid) = fork().unwrap() else {
            let err = super::execv(Path::new("/does/not/exist"), &["x".to_string()]);
            let code = if err.kind() == std::io::ErrorKind::NotFound {
                42
            } else {
                1
            };
            super::_exit(code);
        };

        let (_, event) = child_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(event, WaitEvent::Exited(42));

        let ForkResult::Parent(child_pid) = fork().unwrap() else {
            super::execv(Path::new("/bin/true"), &["true".to_string()]);
            super::_exit(1);
        };

        let (_, event) = child_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(event, WaitEvent::Exited(0));
    }
}
