//! TCP server for the broker protocol.

mod handler;

pub use handler::{dispatch, run_server, run_server_on_listener};
