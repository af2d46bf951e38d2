//! # remote
//!
//! Remote command execution and file transfer for fleet nodes.
//!
//! This crate provides:
//! - Command and script execution over `ssh`, bounded by `timeout(1)`
//! - File collection and upload with `rsync`
//! - A local `bash` path for loopback addresses
//! - An in-memory [`transport::MockTransport`] for tests
//!
//! ## Example
//!
//! ```no_run
//! use remote::transport::{Transport, default_transport};
//! use remote::{ExecRequest, SessionOptions};
//!
//! let transport = default_transport();
//! let options = SessionOptions {
//!     ssh_opts: vec!["-lroot".into(), "-oBatchMode=yes".into()],
//!     ..Default::default()
//! };
//!
//! let out = transport
//!     .exec("10.20.0.2", &ExecRequest::command("uptime", options))
//!     .expect("session failed");
//! if !out.success() {
//!     eprintln!("exit {}: {}", out.code, out.stderr);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use transport::Transport;
pub use types::{ExecOutput, ExecRequest, Payload, SessionOptions};
