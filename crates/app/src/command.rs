//! Terminal commands standing in for the start / stop / stop-alarm buttons

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown command {0:?} (try: start, stop, beep, quit)")]
pub struct UnknownCommand(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Silence the server-side alarm
    StopBeep,
    Quit,
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Ok(Command::Start),
            "stop" | "x" => Ok(Command::Stop),
            "beep" | "stop_beep" | "b" => Ok(Command::StopBeep),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}
