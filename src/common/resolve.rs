use std::{
    env, fs,
    os::unix::prelude::MetadataExt,
    path::{Path, PathBuf},
};

const PATH_DEFAULT: &str = env!("TINYSHELL_PATH_DEFAULT");

/// A regular file with any of the three executable bits set. No check is
/// made that the bit applies to the user running the shell; exec itself
/// settles that.
fn is_executable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Locate the program a pipeline stage should exec. A name containing a
/// `/` is used as given and only checked for being executable; bare names
/// are looked up through `$PATH`.
pub(crate) fn resolve_command(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable_file(&path).then_some(path);
    }

    let search = env::var("PATH").unwrap_or_else(|_| PATH_DEFAULT.to_string());
    search
        .split(':')
        .map(Path::new)
        // Relative entries ("", ".", "./bin") are skipped rather than
        // resolved against whatever directory the shell sits in.
        .filter(|dir| dir.is_absolute())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable_file(candidate))
}
