//! Line-oriented control commands read from stdin in headless mode.

use std::str::FromStr;

use thiserror::Error;

use crate::monitor::TerminationRequest;
use crate::view::ViewAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    View(ViewAction),
    Terminate(TerminationRequest),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} expects an argument")]
    MissingArgument(&'static str),
    #[error("invalid pid: {0}")]
    InvalidPid(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let arg = words.next();
        match verb.to_lowercase().as_str() {
            "sort" => {
                let key = arg.ok_or(CommandError::MissingArgument("sort"))?;
                Ok(Command::View(ViewAction::SetSortKey(key.to_string())))
            }
            "order" => {
                let order = arg.ok_or(CommandError::MissingArgument("order"))?;
                Ok(Command::View(ViewAction::SetSortOrder(order.to_string())))
            }
            "next" => Ok(Command::View(ViewAction::NextSortKey)),
            "prev" | "previous" => Ok(Command::View(ViewAction::PreviousSortKey)),
            "toggle" => Ok(Command::View(ViewAction::ToggleSortOrder)),
            "kill" => pid("kill", arg)
                .map(|pid| Command::Terminate(TerminationRequest::graceful(pid))),
            "kill!" => pid("kill!", arg)
                .map(|pid| Command::Terminate(TerminationRequest::forced(pid))),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn pid(verb: &'static str, arg: Option<&str>) -> Result<u32, CommandError> {
    let raw = arg.ok_or(CommandError::MissingArgument(verb))?;
    raw.parse()
        .map_err(|_| CommandError::InvalidPid(raw.to_string()))
}
