//! Control commands and the channel that carries them to the playback thread.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::trace;

/// Commands to control a playback engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Start or resume playback.
    Play,
    /// Pause playback, keeping the position.
    Pause,
    /// Stop playback and end the session.
    Stop,
    /// Jump to a fraction of the track (0.0 to 1.0).
    Seek(f64),
    /// Set volume (0.0 to 1.0).
    SetVolume(f32),
    /// Flip looping on or off.
    ToggleLoop,
    /// Enable or disable fades on play/pause/stop.
    SetFadeMode(bool),
    /// Enable or disable the fade bracketing seeks.
    SetSeekFade(bool),
    /// Stop immediately without fading.
    Shutdown,
}

/// Create a connected command sender/receiver pair.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = unbounded();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer side; cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<EngineCommand>,
}

impl CommandSender {
    /// Enqueue `command` and return immediately.
    ///
    /// Returns `false` if the playback thread has already exited.
    pub fn send(&self, command: EngineCommand) -> bool {
        trace!("Enqueuing {command:?}");
        self.tx.send(command).is_ok()
    }
}

/// Consumer side, owned by the playback thread.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: Receiver<EngineCommand>,
}

impl CommandReceiver {
    /// Pop the oldest pending command without blocking.
    pub fn try_next(&self) -> Option<EngineCommand> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next command.
    ///
    /// Wakes as soon as a command arrives; returns `None` on timeout.
    pub fn wait(&self, timeout: Duration) -> Option<EngineCommand> {
        match self.rx.recv_timeout(timeout) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Nobody can send anymore; avoid turning the idle wait into a spin.
                std::thread::sleep(timeout);
                None
            }
        }
    }

    /// Number of commands waiting to be applied.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = command_channel();
        assert!(tx.send(EngineCommand::Seek(0.5)));
        assert!(tx.send(EngineCommand::SetVolume(0.2)));
        assert!(tx.send(EngineCommand::Play));

        assert_eq!(rx.pending(), 3);
        assert_eq!(rx.try_next(), Some(EngineCommand::Seek(0.5)));
        assert_eq!(rx.try_next(), Some(EngineCommand::SetVolume(0.2)));
        assert_eq!(rx.try_next(), Some(EngineCommand::Play));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn test_empty_pop_returns_immediately() {
        let (_tx, rx) = command_channel();
        let start = Instant::now();
        assert_eq!(rx.try_next(), None);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_on_arrival() {
        let (tx, rx) = command_channel();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send(EngineCommand::Pause)
        });

        let start = Instant::now();
        assert_eq!(rx.wait(Duration::from_secs(5)), Some(EngineCommand::Pause));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(producer.join().unwrap_or(false));
    }

    #[test]
    fn test_wait_times_out() {
        let (_tx, rx) = command_channel();
        assert_eq!(rx.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_many_producers() {
        let (tx, rx) = command_channel();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        tx.send(EngineCommand::ToggleLoop);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().ok();
        }

        let mut received = 0;
        while rx.try_next().is_some() {
            received += 1;
        }
        assert_eq!(received, 100);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = command_channel();
        drop(rx);
        assert!(!tx.send(EngineCommand::Stop));
    }
}
