//! This module exports a minimal message-passing API. Transports implement
//! the `Communicator` trait, which only needs `send` and `recv` operations
//! (an in-process channel transport and a pure-Rust TCP transport are
//! included). The `Controller` wraps a communicator and provides tagged
//! messages and the collective operations used by the ghost exchange:
//! broadcast, reduce, all-reduce, barrier, and all-to-all.
//!

mod backoff;
pub mod comm;
pub mod controller;
pub mod local;
pub mod tcp;
pub mod util;

pub use comm::Communicator;
pub use controller::Controller;
pub use local::ChannelCommunicator;
pub use tcp::TcpCommunicator;
