//! Console command parsing

use crate::catalog::GenderFacet;
use crate::{Result, VoxError};
use std::path::PathBuf;

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List voices, optionally narrowing the text filter
    Voices(Option<String>),
    /// Set the gender facet and list voices
    Gender(GenderFacet),
    /// Select by list number or label
    Use(String),
    Rate(u16),
    Volume(u8),
    /// Replace the input text
    Text(String),
    /// Load the input text from a file
    Load(PathBuf),
    /// Speak, optionally replacing the input text first
    Say(Option<String>),
    /// Render the input text to a file
    Save(Option<PathBuf>),
    Stop,
    Abandon,
    Rescan,
    Status,
    Debug,
    Help,
    Quit,
    /// Blank line
    Nothing,
}

pub const HELP: &str = "\
Commands:
  voices [query]      list voices, filtered by text
  gender <facet>      filter by any|male|female|unknown
  use <n|label>       select a voice from the list
  rate <80-300>       speaking rate in words per minute
  volume <0-100>      volume percent
  text <words...>     set the text to synthesize
  load <file>         read the text from a file
  say [words...]      speak the text aloud
  save [path]         render the text to an audio file
  stop                stop the running job
  abandon             give up on a stuck job
  rescan              reload the voice list
  status              show current settings
  debug               print diagnostics as JSON
  quit                save settings and exit";

fn rest(arg: &str) -> Option<String> {
    let arg = arg.trim();
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

fn required(arg: &str, usage: &str) -> Result<String> {
    rest(arg).ok_or_else(|| VoxError::Other(format!("usage: {}", usage)))
}

fn number<T: std::str::FromStr>(arg: &str, usage: &str) -> Result<T> {
    required(arg, usage)?
        .parse()
        .map_err(|_| VoxError::Other(format!("usage: {}", usage)))
}

impl Command {
    /// Parse one input line; the verb is case-insensitive
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, arg) = match line.find(char::is_whitespace) {
            Some(at) => (&line[..at], &line[at..]),
            None => (line, ""),
        };

        Ok(match verb.to_ascii_lowercase().as_str() {
            "" => Command::Nothing,
            "voices" | "ls" => Command::Voices(rest(arg)),
            "gender" => Command::Gender(required(arg, "gender any|male|female|unknown")?.parse()?),
            "use" | "voice" => Command::Use(required(arg, "use <n|label>")?),
            "rate" => Command::Rate(number(arg, "rate <80-300>")?),
            "volume" | "vol" => Command::Volume(number(arg, "volume <0-100>")?),
            "text" => Command::Text(required(arg, "text <words...>")?),
            "load" | "open" => Command::Load(PathBuf::from(required(arg, "load <file>")?)),
            "say" | "speak" => Command::Say(rest(arg)),
            "save" => Command::Save(rest(arg).map(PathBuf::from)),
            "stop" => Command::Stop,
            "abandon" => Command::Abandon,
            "rescan" | "reload" => Command::Rescan,
            "status" => Command::Status,
            "debug" => Command::Debug,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => {
                return Err(VoxError::Other(format!(
                    "unknown command '{}', type 'help'",
                    other
                )))
            }
        })
    }
}
