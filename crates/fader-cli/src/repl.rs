//! Line commands typed at the prompt.

use anyhow::{anyhow, bail, Context, Result};
use fader_audio::PlaybackEngine;

pub const HELP: &str = "\
commands:
  play | pause | stop       transport
  seek <0..1>               jump to a fraction of the track
  vol <0..1>                set volume
  loop                      toggle looping
  fade on|off               fade on play, pause and stop
  seekfade on|off           fade around seeks
  status                    print the current status
  help                      show this help
  quit                      stop and exit";

/// A parsed prompt line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Play,
    Pause,
    Stop,
    Seek(f64),
    Volume(f32),
    ToggleLoop,
    Fade(bool),
    SeekFade(bool),
    Status,
    Help,
    Quit,
}

/// Parse one line; blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Action>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    if let Some(extra) = words.next() {
        bail!("unexpected argument: {extra}");
    }

    let action = match (command.to_ascii_lowercase().as_str(), argument) {
        ("play" | "p", None) => Action::Play,
        ("pause", None) => Action::Pause,
        ("stop", None) => Action::Stop,
        ("seek", Some(value)) => Action::Seek(number(value)?),
        ("vol" | "volume", Some(value)) => Action::Volume(number(value)? as f32),
        ("loop", None) => Action::ToggleLoop,
        ("fade", Some(value)) => Action::Fade(switch(value)?),
        ("seekfade", Some(value)) => Action::SeekFade(switch(value)?),
        ("status" | "s", None) => Action::Status,
        ("help" | "?", None) => Action::Help,
        ("quit" | "q" | "exit", None) => Action::Quit,
        ("seek" | "vol" | "volume" | "fade" | "seekfade", None) => {
            bail!("{command} needs an argument")
        }
        (_, Some(value)) if is_known(command) => bail!("unexpected argument: {value}"),
        _ => bail!("unknown command: {command} (try `help`)"),
    };

    Ok(Some(action))
}

fn is_known(command: &str) -> bool {
    matches!(
        command.to_ascii_lowercase().as_str(),
        "play" | "p" | "pause" | "stop" | "loop" | "status" | "s" | "help" | "?" | "quit" | "q" | "exit"
    )
}

fn number(value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("not a number: {value}"))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(anyhow!("not a finite number: {value}"))
    }
}

fn switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => bail!("expected on or off, got {value}"),
    }
}

/// Forward a transport or settings action to the engine.
///
/// Returns `false` for actions the engine does not handle.
pub fn dispatch(engine: &PlaybackEngine, action: Action) -> bool {
    match action {
        Action::Play => engine.play(),
        Action::Pause => engine.pause(),
        Action::Stop => engine.stop(),
        Action::Seek(position) => engine.seek(position),
        Action::Volume(volume) => engine.set_volume(volume),
        Action::ToggleLoop => engine.toggle_loop(),
        Action::Fade(enabled) => engine.set_fade_mode(enabled),
        Action::SeekFade(enabled) => engine.set_seek_fade(enabled),
        Action::Status | Action::Help | Action::Quit => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_transport_words() {
        assert_eq!(parse_line("play").unwrap(), Some(Action::Play));
        assert_eq!(parse_line("  PAUSE ").unwrap(), Some(Action::Pause));
        assert_eq!(parse_line("stop").unwrap(), Some(Action::Stop));
        assert_eq!(parse_line("loop").unwrap(), Some(Action::ToggleLoop));
        assert_eq!(parse_line("q").unwrap(), Some(Action::Quit));
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_arguments() {
        assert_eq!(parse_line("seek 0.2").unwrap(), Some(Action::Seek(0.2)));
        assert_eq!(parse_line("vol 0.7").unwrap(), Some(Action::Volume(0.7)));
        assert_eq!(parse_line("fade on").unwrap(), Some(Action::Fade(true)));
        assert_eq!(parse_line("seekfade off").unwrap(), Some(Action::SeekFade(false)));
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        // The engine clamps; the prompt only checks syntax.
        assert_eq!(parse_line("seek 3").unwrap(), Some(Action::Seek(3.0)));
        assert_eq!(parse_line("vol -1").unwrap(), Some(Action::Volume(-1.0)));
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(parse_line("seek").is_err());
        assert!(parse_line("seek half").is_err());
        assert!(parse_line("seek NaN").is_err());
        assert!(parse_line("fade maybe").is_err());
        assert!(parse_line("play now").is_err());
        assert!(parse_line("vol 0.5 0.6").is_err());
        assert!(parse_line("rewind").is_err());
    }
}
