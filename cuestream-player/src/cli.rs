//! Line commands read from stdin by the player binary

use cuestream_player::TransportCommand;

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Transport(TransportCommand),
    /// Print the musical context and the block active now
    Context,
    Help,
}

pub const HELP: &str = "commands: play | pause | seek <secs> | duration <secs> | status | context | stop | help";

/// Parse one line; `Ok(None)` for blank lines
pub fn parse_line(line: &str) -> Result<Option<CliCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "play" => CliCommand::Transport(TransportCommand::Play),
        "pause" => CliCommand::Transport(TransportCommand::Pause),
        "stop" | "quit" | "exit" => CliCommand::Transport(TransportCommand::Stop),
        "status" => CliCommand::Transport(TransportCommand::Status),
        "seek" => CliCommand::Transport(TransportCommand::Seek(seconds_arg(verb, words.next())?)),
        "duration" => CliCommand::Transport(TransportCommand::SetTotalMediaDuration(seconds_arg(
            verb,
            words.next(),
        )?)),
        "context" => CliCommand::Context,
        "help" | "?" => CliCommand::Help,
        other => return Err(format!("unknown command '{}'; {}", other, HELP)),
    };
    Ok(Some(command))
}

fn seconds_arg(verb: &str, arg: Option<&str>) -> Result<f64, String> {
    let arg = arg.ok_or_else(|| format!("{} needs a time in seconds", verb))?;
    arg.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{}' is not a number of seconds", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_words() {
        assert_eq!(
            parse_line("play").unwrap(),
            Some(CliCommand::Transport(TransportCommand::Play))
        );
        assert_eq!(
            parse_line("  PAUSE ").unwrap(),
            Some(CliCommand::Transport(TransportCommand::Pause))
        );
        assert_eq!(
            parse_line("seek 12.5").unwrap(),
            Some(CliCommand::Transport(TransportCommand::Seek(12.5)))
        );
        assert_eq!(parse_line("context").unwrap(), Some(CliCommand::Context));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_bad_input() {
        assert!(parse_line("seek").is_err());
        assert!(parse_line("seek soon").is_err());
        assert!(parse_line("duration inf").is_err());
        assert!(parse_line("rewind").is_err());
    }
}
