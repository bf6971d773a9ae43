//! The interactive read-evaluate loop.

use std::io::{self, Write};

use crate::common::Error;
use crate::exec::{self, terminal::JobControl};
use crate::jobs::{reaper, JobTable};
use crate::log::{user_error, ShellLogger};

mod builtins;
pub(crate) mod parser;

use self::parser::Pipeline;

pub fn main() {
    ShellLogger::new("tinyshell: ").into_global_logger();

    match run_shell() {
        Ok(()) => {}
        Err(error) => {
            user_error!("{error}");
            std::process::exit(1);
        }
    }
}

fn run_shell() -> Result<(), Error> {
    let control = JobControl::init()?;
    let mut table = JobTable::new();

    loop {
        // Everything the handler noticed since the last command gets
        // reported before the next prompt.
        reaper::drain_status_reports(&mut table);

        prompt();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // End of input acts like an explicit exit.
                println_ignore_io_error!("exit");
                break;
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Io(Some("read"), err)),
        }

        let pipeline = parser::parse(&line);
        if pipeline.is_empty() {
            continue;
        }

        if pipeline.stages.iter().any(|stage| stage.args[0] == "exit") {
            break;
        }

        let result = match job_builtin(&pipeline) {
            Some("jobs") => {
                builtins::jobs(&table);
                Ok(())
            }
            Some("fg") => builtins::foreground(&mut table, &control, &pipeline.stages[0].args),
            Some("bg") => builtins::background(&mut table, &pipeline.stages[0].args),
            _ => exec::run_pipeline(&mut table, &control, &pipeline),
        };

        if let Err(error) = result {
            user_error!("{error}");
        }
    }

    Ok(())
}

/// The job built-ins only apply to a plain single-stage command; inside a
/// pipeline their names resolve like any other program.
fn job_builtin(pipeline: &Pipeline) -> Option<&str> {
    let [stage] = pipeline.stages.as_slice() else {
        return None;
    };
    match stage.args[0].as_str() {
        name @ ("jobs" | "fg" | "bg") => Some(name),
        _ => None,
    }
}

fn prompt() {
    let cwd = std::env::current_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "?".to_string());

    let mut stdout = io::stdout();
    let _ = write!(stdout, "tinyshell:{cwd}$ ");
    let _ = stdout.flush();
}
