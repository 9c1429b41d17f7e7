//! Worker loop - owns the channel, signal handler and room registry.
//!
//! Flow:
//! 1. Adopt the inherited channel socket, install INT/TERM handlers
//! 2. Select between channel events and signals on one task
//! 3. Dispatch each request and answer it exactly once
//! 4. On signal or channel loss: run the shutdown sequence once
//!
//! Shutdown order is fixed: block signals, close the signal handler, close
//! the channel, then close rooms in ascending id order.

use nix::sys::signal::Signal;
use serde_json::json;

use crate::channel::fd::adopt_channel_fd;
use crate::channel::protocol::{MethodId, Target};
use crate::channel::{Channel, ChannelEvent, Request};
use crate::config::WorkerSettings;
use crate::error::{ProtocolViolation, RequestError, WorkerError};
use crate::params::{Parameters, ValueKind};
use crate::room::RoomRegistry;
use crate::signals::{SignalEvent, SignalsHandler, block_all_signals};
use crate::version::VersionInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Closing,
    Closed,
}

/// One completed step of the shutdown sequence, in the order it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    SignalsBlocked,
    SignalsHandlerClosed,
    ChannelClosed,
    RoomClosed(u32),
}

enum LoopEvent {
    Signal(SignalEvent),
    Channel(Result<ChannelEvent, ProtocolViolation>),
}

pub struct Loop {
    state: LoopState,
    channel: Channel,
    signals: SignalsHandler,
    rooms: RoomRegistry,
    version: VersionInfo,
    shutdown_steps: Vec<ShutdownStep>,
}

impl Loop {
    pub fn new(channel: Channel, signals: SignalsHandler) -> Self {
        Self {
            state: LoopState::Running,
            channel,
            signals,
            rooms: RoomRegistry::new(),
            version: VersionInfo::new(),
            shutdown_steps: Vec::new(),
        }
    }

    /// Build the loop from process settings. Must be called within a tokio runtime.
    pub fn from_settings(settings: &WorkerSettings) -> Result<Self, WorkerError> {
        let signals = SignalsHandler::termination()?;
        let stream = adopt_channel_fd(settings.channel_fd)?;
        Ok(Self::new(Channel::new(stream), signals))
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn shutdown_steps(&self) -> &[ShutdownStep] {
        &self.shutdown_steps
    }

    /// Process events until the loop is closed.
    ///
    /// A [`ProtocolViolation`] ends the loop immediately, without shutdown;
    /// the caller is expected to abort.
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        tracing::debug!(pid = self.version.pid, "Starting worker loop");
        while self.state == LoopState::Running {
            self.step().await?;
        }
        tracing::debug!("Worker loop ended");
        Ok(())
    }

    /// Wait for and handle a single event.
    pub async fn step(&mut self) -> Result<(), WorkerError> {
        // Both sources are cancel-safe; a response queued while the signal
        // wins stays in the channel's write buffer.
        let event = tokio::select! {
            signal = self.signals.recv() => LoopEvent::Signal(signal),
            event = self.channel.next_event() => LoopEvent::Channel(event),
        };

        match event {
            LoopEvent::Signal(signal) => self.on_signal(signal).await?,
            LoopEvent::Channel(Ok(ChannelEvent::Request(request))) => {
                self.on_channel_request(request)
            }
            LoopEvent::Channel(Ok(ChannelEvent::RemotelyClosed)) => {
                self.on_channel_remotely_closed().await?
            }
            LoopEvent::Channel(Err(violation)) => {
                tracing::error!(error = %violation, "Protocol violation on control channel");
                return Err(violation.into());
            }
        }
        Ok(())
    }

    pub async fn on_signal(&mut self, event: SignalEvent) -> Result<(), ProtocolViolation> {
        match event.signal {
            Signal::SIGINT | Signal::SIGTERM => {
                tracing::info!(signal = event.name, "Signal received, exiting");
                self.close().await
            }
            other => {
                tracing::warn!(
                    signal = event.name,
                    signum = other as i32,
                    "Received a signal for which there is no handling code"
                );
                Ok(())
            }
        }
    }

    async fn on_channel_remotely_closed(&mut self) -> Result<(), ProtocolViolation> {
        // The parent sends TERM before closing the channel on a clean exit, so
        // reaching here means it died.
        tracing::error!("Channel remotely closed, exiting");
        self.close().await
    }

    pub fn on_channel_request(&mut self, request: Request) {
        tracing::debug!(id = request.id, method = %request.method, "Handling request");

        match self.handle_request(&request) {
            Ok(data) => request.accept(data),
            Err(e) => request.reject(e.code(), e.to_string()),
        }
    }

    fn handle_request(
        &mut self,
        request: &Request,
    ) -> Result<Option<serde_json::Value>, RequestError> {
        match request.method {
            MethodId::DumpWorker => Ok(Some(self.dump())),
            MethodId::CreateRoom => {
                let params = decode_data(request.data.as_ref())?;
                let room_id = room_id_for_create(&params, &request.target)?;
                self.rooms.create(room_id, params)?;
                Ok(None)
            }
            MethodId::CloseRoom => {
                let room_id = target_room_id(&request.target)?;
                self.rooms.close(room_id)?;
                Ok(None)
            }
            MethodId::DumpRoom => {
                let room_id = target_room_id(&request.target)?;
                Ok(Some(self.rooms.get(room_id)?.dump()))
            }
            MethodId::CreatePeer => {
                let room_id = target_room_id(&request.target)?;
                let room = self.rooms.get_mut(room_id)?;
                let params = decode_data(request.data.as_ref())?;
                let peer_name = if has_kind(&params, "peerName", ValueKind::String)? {
                    params.get_string("peerName").to_string()
                } else {
                    target_peer_name(&request.target)?.to_string()
                };
                room.create_peer(&peer_name, params)?;
                Ok(None)
            }
            MethodId::ClosePeer => {
                let room_id = target_room_id(&request.target)?;
                let peer_name = target_peer_name(&request.target)?;
                self.rooms.get_mut(room_id)?.close_peer(peer_name)?;
                Ok(None)
            }
        }
    }

    fn dump(&self) -> serde_json::Value {
        json!({
            "pid": self.version.pid,
            "version": self.version.version,
            "roomIds": self.rooms.ids(),
        })
    }

    /// Run the shutdown sequence. Only the first call does anything.
    ///
    /// Every step runs even if closing the channel fails; that error is
    /// returned afterwards.
    pub async fn close(&mut self) -> Result<(), ProtocolViolation> {
        if self.state != LoopState::Running {
            tracing::error!(state = ?self.state, "Already closed");
            return Ok(());
        }
        self.state = LoopState::Closing;

        if let Err(e) = block_all_signals() {
            tracing::error!(error = %e, "pthread_sigmask() failed");
        }
        self.shutdown_steps.push(ShutdownStep::SignalsBlocked);

        self.signals.close();
        self.shutdown_steps.push(ShutdownStep::SignalsHandlerClosed);

        let channel_result = self.channel.close().await;
        self.shutdown_steps.push(ShutdownStep::ChannelClosed);

        for room_id in self.rooms.close_all() {
            self.shutdown_steps.push(ShutdownStep::RoomClosed(room_id));
        }

        self.state = LoopState::Closed;
        tracing::info!("Worker loop closed");
        channel_result
    }
}

fn decode_data(data: Option<&serde_json::Value>) -> Result<Parameters, RequestError> {
    match data {
        Some(data) => {
            Parameters::decode(data).map_err(|e| RequestError::bad_request(e.to_string()))
        }
        None => Ok(Parameters::new()),
    }
}

/// Whether `key` is present with the expected kind; present with another kind
/// is a bad request.
fn has_kind(params: &Parameters, key: &str, kind: ValueKind) -> Result<bool, RequestError> {
    match params.get(key) {
        None => Ok(false),
        Some(value) if value.kind() == kind => Ok(true),
        Some(value) => Err(RequestError::bad_request(format!(
            "{} must be {}, got {}",
            key,
            kind,
            value.kind()
        ))),
    }
}

fn room_id_for_create(params: &Parameters, target: &Target) -> Result<u32, RequestError> {
    if has_kind(params, "roomId", ValueKind::Integer)? {
        let room_id = params.get_integer("roomId");
        return u32::try_from(room_id).map_err(|_| {
            RequestError::bad_request(format!("roomId must be non-negative, got {}", room_id))
        });
    }
    target_room_id(target)
}

fn target_room_id(target: &Target) -> Result<u32, RequestError> {
    target
        .room_id
        .ok_or_else(|| RequestError::bad_request("missing roomId"))
}

fn target_peer_name(target: &Target) -> Result<&str, RequestError> {
    target
        .peer_name
        .as_deref()
        .ok_or_else(|| RequestError::bad_request("missing peerName"))
}
