// The `std::print` macros panic on any IO error. Job notices and child-side
// diagnostics must survive a closed stream, so printing goes through these
// instead.
macro_rules! println_ignore_io_error {
    ($($tt:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stdout(), $($tt)*);
    }}
}

macro_rules! eprintln_ignore_io_error {
    ($($tt:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), $($tt)*);
    }}
}

// Shadow the std print family crate-wide so a stray use fails the build
// instead of sneaking past review.
macro_rules! ban_std_print_macros {
    ($d:tt $($name:ident)*) => {
        $(
            #[allow(unused_macros)]
            #[cfg(debug_assertions)]
            macro_rules! $name {
                ($d($d tt:tt)*) => {
                    compile_error!(concat!(
                        "do not use `",
                        stringify!($name),
                        "!`; print through the `_ignore_io_error` macros or `write!`"
                    ))
                };
            }
        )*
    };
}

ban_std_print_macros! { $ print println eprint eprintln }
