pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> std::io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(std::io::Error::last_os_error()),
        _ => Ok(res),
    }
}

extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

// The SIGCHLD handler must leave errno as it found it.
pub fn errno() -> libc::c_int {
    unsafe { *errno_location() }
}

pub fn set_errno(no: libc::c_int) {
    unsafe { *errno_location() = no };
}

/// `isatty` that refuses to issue ioctls against files that are not
/// character devices; the probed descriptors are whatever the shell was
/// started with.
pub fn safe_isatty(fildes: libc::c_int) -> bool {
    // FileTypeExt::is_char_device wants an owned handle, so ask fstat
    // directly.
    let mut maybe_stat = std::mem::MaybeUninit::<libc::stat>::uninit();
    if unsafe { libc::fstat(fildes, maybe_stat.as_mut_ptr()) } != 0 {
        return false;
    }
    let mode = unsafe { maybe_stat.assume_init() }.st_mode;

    if mode & libc::S_IFMT != libc::S_IFCHR {
        return false;
    }

    unsafe { libc::isatty(fildes) != 0 }
}
