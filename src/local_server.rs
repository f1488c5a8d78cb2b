//! Loopback host for command-line sign-ins: serves the callback path on
//! `127.0.0.1` and hands the raw callback query to the caller.

mod config;
mod http;
mod server;
mod target;

pub use config::LocalServerConfig;
pub use server::LocalServer;
