//! WebSocket server for real-time verification updates.
//!
//! Clients connect to `/ws`, subscribe (optionally to a set of verification
//! ids), and receive every matching [`VerificationEvent`] as a JSON frame.
//!
//! [`VerificationEvent`]: docverify_verification::VerificationEvent

pub mod error;
pub mod server;
pub mod subscriptions;

pub use error::WsError;
pub use server::{WebSocketServer, WsState};
