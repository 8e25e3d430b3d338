pub mod error;
pub use error::*;

/// Log integrations
pub mod telemetry;
pub use telemetry::*;

pub mod models;
pub use models::*;

pub mod syscall;
pub use syscall::{is_valid_syscall, parse_syscall_list, syscall_suggestions};

pub mod client;
pub use client::*;

pub mod resolve;
pub use resolve::*;

pub mod aggregate;
pub use aggregate::*;

pub mod network;
pub use network::*;

pub mod seccomp;
pub use seccomp::*;

pub mod render;
pub use render::*;

pub mod advise;
pub use advise::*;
