use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Cooperative shutdown signal shared by every device thread.
///
/// Triggering drops the only sender, which disconnects the channel and wakes
/// every [`Shutdown::sleep`] and `select!` on [`Shutdown::receiver`] at once.
#[derive(Clone)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    /// Idempotent.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            log::info!("Shutdown requested");
        }
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless shutdown arrives first.
    /// Returns `true` when shutdown has been triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.receiver.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            _ => true,
        }
    }

    /// Disconnects when shutdown is triggered; for use in `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
