//! Process signal handling on the worker loop.
//!
//! Signals are delivered as events on the same task that drives the control
//! channel; there is no dedicated signal thread.

use std::io;

use nix::sys::signal::{SigSet, SigmaskHow, Signal, pthread_sigmask};
use tokio::signal::unix::{self as unix_signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    pub signal: Signal,
    pub name: &'static str,
}

struct Registration {
    signal: Signal,
    name: &'static str,
    stream: unix_signal::Signal,
}

#[derive(Default)]
pub struct SignalsHandler {
    registrations: Vec<Registration>,
    closed: bool,
}

impl SignalsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for the signals that end the worker (INT and TERM).
    pub fn termination() -> io::Result<Self> {
        let mut handler = Self::new();
        handler.add_signal(Signal::SIGINT, "INT")?;
        handler.add_signal(Signal::SIGTERM, "TERM")?;
        Ok(handler)
    }

    /// Start listening for `signal`. Must be called within a tokio runtime.
    pub fn add_signal(&mut self, signal: Signal, name: &'static str) -> io::Result<()> {
        let stream = unix_signal::signal(SignalKind::from_raw(signal as i32))?;
        tracing::debug!(signal = name, "Signal handler installed");
        self.registrations.push(Registration {
            signal,
            name,
            stream,
        });
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next registered signal.
    ///
    /// Never resolves when nothing is registered (including after close).
    pub async fn recv(&mut self) -> SignalEvent {
        if self.registrations.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.registrations.iter_mut().map(|registration| {
            Box::pin(async move {
                match registration.stream.recv().await {
                    Some(()) => SignalEvent {
                        signal: registration.signal,
                        name: registration.name,
                    },
                    // Runtime shutting down; nothing more will arrive.
                    None => std::future::pending().await,
                }
            })
        });

        let (event, _, _) = futures::future::select_all(waits).await;
        event
    }

    /// Drop every registration.
    pub fn close(&mut self) {
        if self.closed {
            tracing::error!("Signals handler already closed");
            return;
        }
        self.closed = true;
        self.registrations.clear();
        tracing::debug!("Signals handler closed");
    }
}

/// Block delivery of every signal to the calling thread.
pub fn block_all_signals() -> nix::Result<()> {
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&SigSet::all()), None)
}
