//! Two-party TCP chat with a small binary framing protocol.
//!
//! Each message on the wire is a 4-byte header (`length | kind | flags`)
//! followed by its payload; one session loop multiplexes local standard
//! input against the peer socket. Each module covers a concrete
//! responsibility:
//!
//! - [`cli`] parses the command-line interface for the listen and connect
//!   roles.
//! - [`packet`] encodes and decodes the packet header and frames payloads.
//! - [`buffer`] owns the reusable receive buffer and its growth policy.
//! - [`session`] is the core loop: it frames outbound text, deframes
//!   inbound packets, and dispatches them by kind.
//! - [`client`] and [`server`] establish connections and run one session
//!   per connection.
//!
//! Unit and integration tests drive [`session::run_session`] directly over
//! in-memory pipes and loopback TCP.

pub mod buffer;
pub mod cli;
pub mod client;
pub mod packet;
pub mod server;
pub mod session;
