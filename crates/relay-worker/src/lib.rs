//! relay-worker: control plane of a media relay worker process.
//!
//! The worker is spawned by a parent process that talks to it over an
//! inherited Unix socket. [`Loop`] owns that channel, the signal handler and
//! the room registry, and runs them on a single thread until shutdown.

mod version;

pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod params;
pub mod room;
pub mod signals;
pub mod worker_loop;

pub use channel::protocol::{MethodId, Response, Target};
pub use channel::{Channel, ChannelEvent, Request};
pub use config::{ConfigError, LogFormat, LogLevel, WorkerSettings};
pub use error::{ProtocolViolation, RequestError, WorkerError};
pub use params::{Parameters, ParametersError, Value, ValueKind};
pub use room::{Peer, Room, RoomRegistry};
pub use signals::{SignalEvent, SignalsHandler};
pub use version::{VersionInfo, WORKER_VERSION};
pub use worker_loop::{Loop, LoopState, ShutdownStep};
