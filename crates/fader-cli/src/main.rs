//! # Fader
//!
//! Terminal front end for the fader playback engine: plays one file and
//! takes transport commands on stdin.

mod cli;
mod repl;

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use fader_audio::{EngineEvent, PlaybackEngine};
use fader_core::{EngineSnapshot, Volume};
use repl::Action;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the status line is refreshed.
const STATUS_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for status output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fader=info,fader_audio=info,fader_core=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        return list_devices();
    }

    let Some(path) = args.path.as_deref() else {
        anyhow::bail!("no audio file given");
    };
    let config = args.engine_config()?;

    info!("Starting fader v{}", env!("CARGO_PKG_VERSION"));
    let engine = PlaybackEngine::open(path, config)
        .with_context(|| format!("failed to play {}", path.display()))?;

    let mut status = StatusLine::new(args.json);
    if !args.json {
        println!("{}  (type `help` for commands)", engine.track_name());
    }

    let lines = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        if stdin_open {
            match lines.recv_timeout(STATUS_INTERVAL) {
                Ok(line) => match repl::parse_line(&line) {
                    Ok(Some(Action::Quit)) => break,
                    Ok(Some(Action::Help)) => println!("{}", repl::HELP),
                    Ok(Some(Action::Status)) => status.print(&engine.snapshot()),
                    Ok(Some(action)) => {
                        repl::dispatch(&engine, action);
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{e:#}"),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Keep playing until the track ends.
                    debug!("stdin closed");
                    stdin_open = false;
                }
            }
        } else {
            std::thread::sleep(STATUS_INTERVAL);
        }

        for event in std::iter::from_fn(|| engine.try_recv_event()) {
            report(&event);
        }
        status.refresh(&engine.snapshot());

        if engine.is_finished() {
            return engine.join().context("playback failed");
        }
    }

    engine.close().context("playback failed")
}

fn list_devices() -> Result<()> {
    let default = fader_audio::output::default_device_name();
    for name in fader_audio::output::list_output_devices()? {
        let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}

/// Forward stdin lines over a channel so the main loop can also tick.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_or_else(
            |e| {
                warn!("Failed to spawn stdin reader: {e}");
                // Dropping the sender reads as closed stdin.
                unbounded().1
            },
            |_| rx,
        )
}

fn report(event: &EngineEvent) {
    match event {
        EngineEvent::TrackFinished => info!("Track finished"),
        EngineEvent::DeviceFailed(message) => eprintln!("audio device failed: {message}"),
        EngineEvent::SeekCommitted(position) => debug!("Seek committed at {position:.3}"),
        EngineEvent::StateChanged(state) => debug!("State: {state}"),
    }
}

/// Prints the engine status whenever it changes.
struct StatusLine {
    json: bool,
    last: Option<String>,
    /// Shown while a seek is in flight and the position is unknown.
    last_time: String,
}

impl StatusLine {
    fn new(json: bool) -> Self {
        Self {
            json,
            last: None,
            last_time: "-:-- / -:--".to_string(),
        }
    }

    fn render(&mut self, snapshot: &EngineSnapshot) -> String {
        if self.json {
            return serde_json::to_string(snapshot).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        }

        if let Some(time) = snapshot.time_label() {
            self.last_time = time;
        }
        format!(
            "[{:<20}] {}  vol {:>3}%  loop {}  fade {}  seekfade {}",
            snapshot.state,
            self.last_time,
            Volume::new(snapshot.volume).as_percentage(),
            on_off(snapshot.looping),
            on_off(snapshot.fade_enabled),
            on_off(snapshot.seek_fade_enabled),
        )
    }

    /// Print only if something visible changed.
    fn refresh(&mut self, snapshot: &EngineSnapshot) {
        let line = self.render(snapshot);
        if self.last.as_deref() != Some(line.as_str()) {
            println!("{line}");
            self.last = Some(line);
        }
    }

    fn print(&mut self, snapshot: &EngineSnapshot) {
        let line = self.render(snapshot);
        println!("{line}");
        self.last = Some(line);
    }
}

const fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
