//! Controller transport: pooled TCP sockets and per-controller outbound
//! channels.

pub mod channel;
pub mod pool;
pub mod socket;

pub use channel::{
    ControllerChannel, ControllerStatus, EnqueueOutcome, OUTBOUND_QUEUE_CAP, TelemetrySummary,
    batch_due,
};
pub use pool::{SharedSocket, SocketPool};
pub use socket::{ConnectOutcome, ControllerSocket, SendReport, parse_host, resolve_host};
