use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::trace;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Trailing-edge debouncer. Values pushed while the quiet window keeps being
/// restarted collapse into one emission carrying the last value.
#[derive(Debug)]
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Returns the debouncer and the receiver of settled values. The
    /// receiver closes once the debouncer is dropped and the last pending
    /// value has been flushed.
    pub fn spawn(window: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, mut input) = mpsc::unbounded_channel::<T>();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(mut latest) = input.recv().await {
                loop {
                    tokio::select! {
                        next = input.recv() => match next {
                            Some(value) => {
                                trace!("debounce window restarted");
                                latest = value;
                            }
                            None => {
                                let _ = out_tx.send(latest);
                                return;
                            }
                        },
                        _ = sleep(window) => break,
                    }
                }
                if out_tx.send(latest).is_err() {
                    return;
                }
            }
        });

        (Self { tx }, out_rx)
    }

    /// Returns `false` once the output side is gone.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}
