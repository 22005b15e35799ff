//! # SOAP Server - Connection Registry
//!
//! Tracks the accepted connections of one listening endpoint.
//!
//! ```text
//!   TcpListener ──accept──► ConnectionRegistry ──spawn──► ConnectionHandler
//!        ▲                   (live set, count)                  │
//!        └────────────── close notification (mpsc) ◄────────────┘
//! ```
//!
//! The registry is owned by the listening loop and mutated only there;
//! connection tasks report their end over a channel instead of touching it.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use error::{RegistryError, ServerError};
pub use handler::ConnectionHandler;
pub use registry::ConnectionRegistry;
pub use server::{ServerHandle, SoapServer};
