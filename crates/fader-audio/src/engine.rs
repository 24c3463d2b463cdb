//! Playback engine: one track, one output stream, one dedicated thread.
//!
//! Control requests travel over the command channel and are applied by the
//! playback thread one per loop iteration. Each iteration then renders at
//! most one chunk for the current state and hands it to the sink, whose
//! blocking `write` paces the loop.
//!
//! Fade envelopes are armed with the user volume, so a fading chunk is
//! scaled by the envelope value alone rather than `volume * envelope`; the
//! gain then lands exactly on `volume` when the fade ends. `Stop` from
//! `Paused` goes straight to `Stopped` without a fade-out, since nothing is
//! audible to fade.

use crate::command::{command_channel, CommandReceiver, CommandSender, EngineCommand};
use crate::fade::FadeEnvelope;
use crate::output::{AudioSink, CpalSink};
use crate::track::Track;
use crossbeam_channel::{bounded, Receiver, Sender};
use fader_core::{clamp_unit, EngineConfig, EngineSnapshot, Error, PlayerState, Result, Volume};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Events kept for [`PlaybackEngine::try_recv_event`] before new ones are dropped.
pub const EVENT_CAPACITY: usize = 64;

/// Events emitted by the playback thread.
///
/// Informational only; the query methods on [`PlaybackEngine`] remain the
/// source of truth. At most [`EVENT_CAPACITY`] undrained events are kept,
/// so callers that never poll lose nothing but the events.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback state changed.
    StateChanged(PlayerState),
    /// A seek jump was committed at this fraction of the track.
    SeekCommitted(f64),
    /// The end of the track was reached with looping off.
    TrackFinished,
    /// The output device failed; the engine has stopped.
    DeviceFailed(String),
}

/// Playback cursor, guarded by the position lock.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    frame: usize,
    /// A seek target has been accepted but not yet committed.
    seek_pending: bool,
}

/// Settings mirrored for readers on other threads.
#[derive(Debug, Clone, Copy)]
struct Settings {
    volume: Volume,
    looping: bool,
    fade_enabled: bool,
    seek_fade_enabled: bool,
}

impl Settings {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            volume: config.initial_volume,
            looping: config.looping,
            fade_enabled: config.fade_enabled,
            seek_fade_enabled: config.seek_fade_enabled,
        }
    }
}

/// State shared between the engine handle and its playback thread.
///
/// Only the playback thread writes.
struct Shared {
    state: RwLock<PlayerState>,
    cursor: Mutex<Cursor>,
    settings: RwLock<Settings>,
}

/// Handle to a playing track.
///
/// Constructing an engine loads the track, opens the output and starts the
/// playback thread. Every control method only enqueues a command and
/// returns immediately. Dropping the handle shuts the thread down and waits
/// for it, so the device is never written after release.
pub struct PlaybackEngine {
    track_name: String,
    frame_count: usize,
    duration: f64,
    shared: Arc<Shared>,
    commands: CommandSender,
    event_rx: Receiver<EngineEvent>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl PlaybackEngine {
    /// Load `path` and play it on the configured output device.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        let track = Track::load(path)?;
        let track_name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned());
        let device = config.device.clone();

        Self::with_sink(track_name, track, config, move |sample_rate, channels| {
            CpalSink::open(sample_rate, channels, device.as_deref())
        })
    }

    /// Play an already loaded track into the sink built by `open_sink`.
    ///
    /// `open_sink` receives the track's sample rate and channel count and
    /// runs on the playback thread. Its error is returned from here and no
    /// engine is created.
    pub fn with_sink<S, F>(
        track_name: impl Into<String>,
        track: Track,
        config: EngineConfig,
        open_sink: F,
    ) -> Result<Self>
    where
        S: AudioSink + 'static,
        F: FnOnce(u32, u16) -> Result<S> + Send + 'static,
    {
        config.validate()?;

        let track_name = track_name.into();
        let track = Arc::new(track);
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let shared = Arc::new(Shared {
            state: RwLock::new(PlayerState::Stopped),
            cursor: Mutex::new(Cursor::default()),
            settings: RwLock::new(Settings::from_config(&config)),
        });

        let worker_track = Arc::clone(&track);
        let worker_shared = Arc::clone(&shared);

        let thread = std::thread::Builder::new()
            .name("playback-engine".to_string())
            .spawn(move || {
                // Open the sink inside the worker thread (cpal::Stream is not Send)
                let sink = match open_sink(worker_track.sample_rate(), worker_track.channels()) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(());
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let worker = EngineWorker::new(
                    command_rx,
                    event_tx,
                    worker_shared,
                    worker_track,
                    sink,
                    &config,
                );
                worker.run()
            })
            .map_err(|e| Error::Internal(format!("Failed to spawn playback thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::Internal(
                    "Playback thread exited before opening the output".to_string(),
                ));
            }
        }

        info!(
            "Playback engine ready: {} ({:.2}s)",
            track_name,
            track.duration()
        );

        Ok(Self {
            track_name,
            frame_count: track.frame_count(),
            duration: track.duration(),
            shared,
            commands: command_tx,
            event_rx,
            thread: Some(thread),
        })
    }

    fn send(&self, command: EngineCommand) {
        if !self.commands.send(command) {
            debug!("Playback thread has exited; dropping {command:?}");
        }
    }

    /// Start or resume playback.
    pub fn play(&self) {
        self.send(EngineCommand::Play);
    }

    /// Pause playback.
    pub fn pause(&self) {
        self.send(EngineCommand::Pause);
    }

    /// Stop playback; the playback thread exits once stopped.
    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    /// Seek to a fraction of the track (clamped to 0.0..=1.0).
    pub fn seek(&self, position: f64) {
        self.send(EngineCommand::Seek(position));
    }

    /// Set the volume (clamped to 0.0..=1.0).
    pub fn set_volume(&self, volume: f32) {
        self.send(EngineCommand::SetVolume(volume));
    }

    pub fn toggle_loop(&self) {
        self.send(EngineCommand::ToggleLoop);
    }

    /// Enable or disable fades on play, pause and stop.
    pub fn set_fade_mode(&self, enabled: bool) {
        self.send(EngineCommand::SetFadeMode(enabled));
    }

    /// Enable or disable the fade bracketing seeks.
    pub fn set_seek_fade(&self, enabled: bool) {
        self.send(EngineCommand::SetSeekFade(enabled));
    }

    /// A sender for driving this engine from other threads.
    pub fn command_sender(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Fraction of the track played so far.
    ///
    /// `None` while a seek has been accepted but its jump is not committed;
    /// callers should keep showing their last value.
    pub fn get_position(&self) -> Option<f64> {
        let cursor = self.shared.cursor.lock();
        if cursor.seek_pending {
            None
        } else {
            Some(cursor.frame as f64 / self.frame_count as f64)
        }
    }

    /// Track length in seconds.
    pub const fn get_duration(&self) -> f64 {
        self.duration
    }

    pub fn get_state(&self) -> PlayerState {
        *self.shared.state.read()
    }

    pub fn volume(&self) -> f32 {
        self.shared.settings.read().volume.as_f32()
    }

    pub fn is_looping(&self) -> bool {
        self.shared.settings.read().looping
    }

    pub fn fade_enabled(&self) -> bool {
        self.shared.settings.read().fade_enabled
    }

    pub fn seek_fade_enabled(&self) -> bool {
        self.shared.settings.read().seek_fade_enabled
    }

    pub fn track_name(&self) -> &str {
        &self.track_name
    }

    /// Everything a UI needs for one redraw.
    pub fn snapshot(&self) -> EngineSnapshot {
        let settings = *self.shared.settings.read();
        EngineSnapshot {
            track_name: self.track_name.clone(),
            state: self.get_state(),
            position: self.get_position(),
            duration: self.duration,
            volume: settings.volume.as_f32(),
            looping: settings.looping,
            fade_enabled: settings.fade_enabled,
            seek_fade_enabled: settings.seek_fade_enabled,
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv_event(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Whether the playback thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the playback thread to exit on its own, e.g. after [`stop`](Self::stop).
    ///
    /// Returns the device error that ended playback, if any.
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    /// Stop immediately without fading, wait for the thread and release the device.
    pub fn close(mut self) -> Result<()> {
        self.send(EngineCommand::Shutdown);
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread
            .join()
            .map_err(|_| Error::Internal("Playback thread panicked".to_string()))?
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.send(EngineCommand::Shutdown);
            if let Err(e) = self.join_thread() {
                debug!("Playback engine ended with error: {e}");
            }
        }
    }
}

/// Where a running manual fade-out lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeOutTarget {
    Paused,
    Stopped,
}

/// Which gain shapes a rendered chunk.
#[derive(Debug, Clone, Copy)]
enum Gain {
    Volume,
    Manual,
    Seek,
}

/// Result of rendering one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Emitted,
    EndOfTrack,
}

/// Internal worker that owns the sink and runs the playback loop.
struct EngineWorker<S: AudioSink> {
    commands: CommandReceiver,
    event_tx: Sender<EngineEvent>,
    shared: Arc<Shared>,
    track: Arc<Track>,
    sink: S,
    chunk_size: usize,
    idle_wait: Duration,
    /// Scratch buffer for the gain-scaled chunk.
    scratch: Vec<f32>,

    state: PlayerState,
    previous_state: PlayerState,
    fade_out_target: FadeOutTarget,
    /// Set once the engine has left `Stopped`; reaching `Stopped` again ends the session.
    session_started: bool,
    settings: Settings,
    seek_target: Option<f64>,
    manual_fade: FadeEnvelope,
    seek_fade: FadeEnvelope,
    /// Gain applied to the most recent chunk.
    last_gain: f32,
}

impl<S: AudioSink> EngineWorker<S> {
    fn new(
        commands: CommandReceiver,
        event_tx: Sender<EngineEvent>,
        shared: Arc<Shared>,
        track: Arc<Track>,
        sink: S,
        config: &EngineConfig,
    ) -> Self {
        let mut worker = Self {
            commands,
            event_tx,
            shared,
            track,
            sink,
            chunk_size: config.chunk_size,
            idle_wait: config.idle_wait,
            scratch: Vec::new(),
            state: PlayerState::Stopped,
            previous_state: PlayerState::Stopped,
            fade_out_target: FadeOutTarget::Stopped,
            session_started: false,
            settings: Settings::from_config(config),
            seek_target: None,
            manual_fade: FadeEnvelope::new(config.fade_duration),
            seek_fade: FadeEnvelope::new(config.seek_fade_duration),
            last_gain: 0.0,
        };
        if config.autoplay {
            worker.handle_play();
        }
        worker
    }

    fn run(mut self) -> Result<()> {
        info!("Playback engine worker started");
        let result = self.run_loop();
        self.sink.close();
        info!("Playback engine worker exiting");
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            let command = if self.is_idle() {
                self.commands.wait(self.idle_wait)
            } else {
                self.commands.try_next()
            };
            if let Some(command) = command {
                self.apply(command);
            }

            match self.state {
                PlayerState::Stopped => {
                    if self.session_started {
                        break;
                    }
                }
                PlayerState::Paused => {}
                PlayerState::Playing => {
                    if self.render_chunk(Gain::Volume)? == Chunk::EndOfTrack {
                        self.end_of_track();
                    }
                }
                PlayerState::FadingIn => {
                    if self.render_chunk(Gain::Manual)? == Chunk::EndOfTrack {
                        self.end_of_track();
                    } else if !self.manual_fade.is_active() {
                        self.set_state(PlayerState::Playing);
                    }
                }
                PlayerState::FadingOut => {
                    if self.render_chunk(Gain::Manual)? == Chunk::EndOfTrack {
                        self.end_of_track();
                    } else if !self.manual_fade.is_active() {
                        let next = match self.fade_out_target {
                            FadeOutTarget::Paused => PlayerState::Paused,
                            FadeOutTarget::Stopped => PlayerState::Stopped,
                        };
                        self.set_state(next);
                    }
                }
                PlayerState::Seeking => self.step_seek()?,
                PlayerState::FadingInAfterSeek => {
                    if self.render_chunk(Gain::Seek)? == Chunk::EndOfTrack {
                        self.end_of_track();
                    } else if !self.seek_fade.is_active() {
                        self.set_state(self.previous_state);
                    }
                }
            }
        }

        Ok(())
    }

    /// No audio to produce: block on the command channel instead of spinning.
    fn is_idle(&self) -> bool {
        match self.state {
            PlayerState::Stopped => !self.session_started,
            state => !state.is_audible(),
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        debug!("Applying {command:?} in {:?}", self.state);

        match command {
            EngineCommand::Play => self.handle_play(),
            EngineCommand::Pause => self.handle_pause(),
            EngineCommand::Stop => self.handle_stop(),
            EngineCommand::Seek(position) => self.handle_seek(position),
            EngineCommand::SetVolume(volume) => {
                self.settings.volume = Volume::new(volume);
                let volume = self.settings.volume.as_f32();
                self.manual_fade.retarget(volume);
                self.seek_fade.retarget(volume);
            }
            EngineCommand::ToggleLoop => self.settings.looping = !self.settings.looping,
            EngineCommand::SetFadeMode(enabled) => self.settings.fade_enabled = enabled,
            EngineCommand::SetSeekFade(enabled) => self.settings.seek_fade_enabled = enabled,
            EngineCommand::Shutdown => {
                self.abort_seek();
                self.session_started = true;
                self.set_state(PlayerState::Stopped);
            }
        }

        *self.shared.settings.write() = self.settings;
    }

    fn handle_play(&mut self) {
        match self.state {
            PlayerState::Stopped if self.session_started => {
                debug!("Session already ended");
            }
            PlayerState::Stopped | PlayerState::Paused => {
                if self.settings.fade_enabled {
                    self.manual_fade.start_fade_in(self.settings.volume.as_f32());
                    self.set_state(PlayerState::FadingIn);
                } else {
                    self.set_state(PlayerState::Playing);
                }
            }
            _ => debug!("Already playing"),
        }
    }

    fn handle_pause(&mut self) {
        if self.state != PlayerState::Playing {
            debug!("Cannot pause, not currently playing");
            return;
        }

        if self.settings.fade_enabled {
            self.manual_fade.start_fade_out(self.settings.volume.as_f32());
            self.fade_out_target = FadeOutTarget::Paused;
            self.set_state(PlayerState::FadingOut);
        } else {
            self.set_state(PlayerState::Paused);
        }
    }

    fn handle_stop(&mut self) {
        match self.state {
            PlayerState::Stopped => {
                // Stop before the first play still ends the session.
                self.session_started = true;
            }
            // Nothing audible to fade from.
            PlayerState::Paused => self.set_state(PlayerState::Stopped),
            audible => {
                self.abort_seek();
                if self.settings.fade_enabled {
                    let from = if audible.is_fading() {
                        self.last_gain
                    } else {
                        self.settings.volume.as_f32()
                    };
                    self.manual_fade.start_fade_out(from);
                    self.fade_out_target = FadeOutTarget::Stopped;
                    self.set_state(PlayerState::FadingOut);
                } else {
                    self.set_state(PlayerState::Stopped);
                }
            }
        }
    }

    fn handle_seek(&mut self, position: f64) {
        let position = clamp_unit(position);

        match self.state {
            PlayerState::Seeking => {
                // Fade-out already running; just move the destination.
                self.seek_target = Some(position);
            }
            PlayerState::Playing if self.settings.seek_fade_enabled => {
                self.previous_state = PlayerState::Playing;
                self.seek_target = Some(position);
                self.shared.cursor.lock().seek_pending = true;
                self.seek_fade.start_fade_out(self.settings.volume.as_f32());
                self.set_state(PlayerState::Seeking);
            }
            _ => self.commit_seek(position),
        }
    }

    /// One iteration of the seek bracket.
    fn step_seek(&mut self) -> Result<()> {
        if self.seek_fade.is_active() {
            // Keep fading out from the pre-seek position.
            if self.render_chunk(Gain::Seek)? == Chunk::EndOfTrack {
                self.seek_fade.cancel();
            }
            if self.seek_fade.is_active() {
                return Ok(());
            }
        }

        if let Some(target) = self.seek_target.take() {
            self.commit_seek(target);
        }

        // A started bracket always fades back in, even if seek fades were
        // switched off while it ran.
        if self.previous_state == PlayerState::Playing {
            self.seek_fade.start_fade_in(self.settings.volume.as_f32());
            self.set_state(PlayerState::FadingInAfterSeek);
        } else {
            self.set_state(self.previous_state);
        }
        Ok(())
    }

    /// Jump to `position` and clear any pending seek.
    fn commit_seek(&mut self, position: f64) {
        let frame = seek_frame(position, self.track.frame_count());
        {
            let mut cursor = self.shared.cursor.lock();
            cursor.frame = frame;
            cursor.seek_pending = false;
        }
        debug!("Seek committed: {position:.3} (frame {frame})");
        self.emit(EngineEvent::SeekCommitted(position));
    }

    /// Commit an in-flight seek bracket right away.
    fn abort_seek(&mut self) {
        if let Some(target) = self.seek_target.take() {
            self.commit_seek(target);
        }
        self.seek_fade.cancel();
    }

    /// Render the chunk at the cursor and submit it to the sink.
    fn render_chunk(&mut self, gain: Gain) -> Result<Chunk> {
        let track = Arc::clone(&self.track);
        let start = self.shared.cursor.lock().frame;
        let frames = track.frames(start, self.chunk_size);
        if frames.is_empty() {
            return Ok(Chunk::EndOfTrack);
        }

        let gain = match gain {
            Gain::Volume => self.settings.volume.as_f32(),
            Gain::Manual => self.manual_fade.get_volume_multiplier(),
            Gain::Seek => self.seek_fade.get_volume_multiplier(),
        };
        self.last_gain = gain;

        self.scratch.clear();
        self.scratch.extend(frames.iter().map(|sample| sample * gain));

        if let Err(e) = self.sink.write(&self.scratch) {
            return Err(self.fail(e));
        }

        let advanced = frames.len() / usize::from(track.channels());
        self.shared.cursor.lock().frame = start + advanced;
        trace!("Rendered {advanced} frames at {start} (gain {gain:.3})");
        Ok(Chunk::Emitted)
    }

    fn end_of_track(&mut self) {
        if self.settings.looping {
            debug!("End of track, looping");
            self.shared.cursor.lock().frame = 0;
        } else {
            info!("Playback finished");
            self.emit(EngineEvent::TrackFinished);
            self.set_state(PlayerState::Stopped);
        }
    }

    /// Sink failures end the session; no retry.
    fn fail(&mut self, err: Error) -> Error {
        error!("Audio output failed, stopping playback: {err}");
        self.emit(EngineEvent::DeviceFailed(err.to_string()));
        self.abort_seek();
        self.session_started = true;
        self.set_state(PlayerState::Stopped);
        err
    }

    /// Queue an event; dropped if nobody has drained the queue.
    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            trace!("Event queue full, dropping event");
        }
    }

    fn set_state(&mut self, new_state: PlayerState) {
        let old_state = self.state;
        self.state = new_state;
        *self.shared.state.write() = new_state;

        if new_state != PlayerState::Stopped {
            self.session_started = true;
        }

        if old_state != new_state {
            debug!("State changed: {:?} -> {:?}", old_state, new_state);
            self.emit(EngineEvent::StateChanged(new_state));
        }
    }
}

/// Frame a seek to `position` (already clamped to `[0, 1]`) lands on.
fn seek_frame(position: f64, frame_count: usize) -> usize {
    ((position * frame_count as f64).round() as usize).min(frame_count)
}
