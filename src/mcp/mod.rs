//! JSON-RPC core shared by both transports.
//!
//! - `protocol` - Request/response types, error codes, request validation
//! - `handler` - Method handler trait and registry
//! - `server` - Dispatcher
//! - `progress` - Task progress store
//! - `transport` - Newline-delimited socket transport

pub mod handler;
pub mod progress;
pub mod protocol;
pub mod server;
pub mod transport;

pub use handler::{MethodHandler, MethodRegistry};
pub use progress::{ProgressStore, TaskProgress};
pub use protocol::*;
pub use server::Dispatcher;
pub use transport::{JsonLineCodec, SocketServer};
