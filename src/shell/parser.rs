//! Splitting an input line into a pipeline.
//!
//! Tokens are separated by whitespace; there is no quoting, escaping or
//! expansion. A line holds at most one pipeline: stages separated by `|`,
//! per-stage redirections and an optional trailing `&`.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RedirectMode {
    Truncate,
    Append,
}

/// One pipeline stage. `args` is never empty for a stage stored in a
/// [`Pipeline`].
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CommandSpec {
    pub(crate) args: Vec<String>,
    pub(crate) stdin_from: Option<PathBuf>,
    pub(crate) stdout_to: Option<(PathBuf, RedirectMode)>,
    pub(crate) stderr_to: Option<(PathBuf, RedirectMode)>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Pipeline {
    pub(crate) stages: Vec<CommandSpec>,
    pub(crate) background: bool,
}

impl Pipeline {
    pub(crate) fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The line as the job table remembers it: stage words joined by single
    /// spaces, stages joined by ` | `. Redirections and the background
    /// marker are not part of it.
    pub(crate) fn command_text(&self) -> String {
        self.stages
            .iter()
            .map(|stage| stage.args.join(" "))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Parsing never fails: unknown words are arguments, a redirection operator
/// without a target is dropped, and an empty stage is skipped.
pub(crate) fn parse(line: &str) -> Pipeline {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();

    // Only a trailing ampersand backgrounds the pipeline; anywhere else it
    // is an ordinary argument.
    let background = tokens.last() == Some(&"&");
    if background {
        tokens.pop();
    }

    let mut stages = Vec::new();
    let mut stage = CommandSpec::default();

    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        match token {
            "|" => {
                if !stage.args.is_empty() {
                    stages.push(std::mem::take(&mut stage));
                }
            }
            "<" => stage.stdin_from = tokens.next().map(PathBuf::from),
            ">" => stage.stdout_to = sink(tokens.next(), RedirectMode::Truncate),
            ">>" => stage.stdout_to = sink(tokens.next(), RedirectMode::Append),
            "2>" => stage.stderr_to = sink(tokens.next(), RedirectMode::Truncate),
            "2>>" => stage.stderr_to = sink(tokens.next(), RedirectMode::Append),
            word => stage.args.push(word.to_string()),
        }
    }
    if !stage.args.is_empty() {
        stages.push(stage);
    }

    Pipeline { stages, background }
}

fn sink(token: Option<&str>, mode: RedirectMode) -> Option<(PathBuf, RedirectMode)> {
    token.map(|path| (PathBuf::from(path), mode))
}
