//! # SOAP Client - Call Dispatcher
//!
//! Sends SOAP 1.1 calls over HTTP POST to one endpoint.
//!
//! ## Architecture
//!
//! ```text
//!   call_no_reply ──┐
//!                   ├──► Dispatcher ──► EnvelopeBuilder ──► HttpTransport
//!   async_call ─────┤        ▲                               (reqwest)
//!                   │        │                                   │
//!   call ──► FIFO ──► SyncWorker (one thread, one call at a time)│
//!                                                                ▼
//!                     PendingCall ◄── parse_reply ◄──────── HttpReply
//! ```
//!
//! Authentication challenges (HTTP 401) are answered by the installed
//! [`Authenticator`]; without one the call fails with
//! [`CallError::AuthenticationDeclined`].
//!
//! ## Usage
//!
//! ```ignore
//! use soap_client::{ClientConfig, Message, SoapClient};
//!
//! let client = SoapClient::connect(ClientConfig::new("http://host/soap", "urn:calc"))?;
//! let message = Message::encoded().with_argument("a", 2).with_argument("b", 3);
//! let reply = client.call("Add", &message, None)?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod auth;
pub mod call_id;
pub mod client;
pub mod config;
mod dispatcher;
pub mod error;
pub mod pending;
pub mod ports;
mod worker;

pub use adapters::ReqwestTransport;
pub use auth::{AuthChallenge, Authenticator, BasicAuthentication, Credentials};
pub use call_id::CallId;
pub use client::SoapClient;
pub use config::{ClientConfig, ConfigError, DEBUG_ENV_VAR};
pub use error::{CallError, ClientError};
pub use pending::PendingCall;
pub use ports::{HttpReply, HttpTransport, SoapRequest, TransportError};

pub use soap_envelope::{Message, Payload, QualifiedType, SoapFault, Use, Value, ValueList};
