use std::fmt::Debug;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, trace};

pub trait SoundPlayer: Send + Sync + Debug {
    fn play(&self);
}

/// Rings the terminal bell.
#[derive(Debug, Default, Clone)]
pub struct TerminalBell;

impl SoundPlayer for TerminalBell {
    fn play(&self) {
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
    }
}

#[derive(Debug, Default)]
pub struct CountingPlayer {
    plays: AtomicUsize,
}

impl CountingPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl SoundPlayer for CountingPlayer {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

/// Refuses to play until the user has interacted once.
#[derive(Debug)]
pub struct SoundGate {
    unlocked: AtomicBool,
    player: Arc<dyn SoundPlayer>,
}

impl SoundGate {
    pub fn new(player: Arc<dyn SoundPlayer>) -> Self {
        Self {
            unlocked: AtomicBool::new(false),
            player,
        }
    }

    pub fn record_gesture(&self) {
        if !self.unlocked.swap(true, Ordering::SeqCst) {
            trace!("sound unlocked by user gesture");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    /// Returns whether the sound was played.
    pub fn request_play(&self) -> bool {
        if !self.is_unlocked() {
            debug!("notification sound skipped, no user gesture yet");
            return false;
        }
        self.player.play();
        true
    }
}
