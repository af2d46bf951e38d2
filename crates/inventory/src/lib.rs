//! # inventory
//!
//! Client for the cluster manager's REST API.
//!
//! The API is the primary source of the node inventory and of release
//! metadata. Only three read-only resources are used: `nodes`, `version`
//! and `clusters`.
//!
//! ## Example
//!
//! ```no_run
//! use inventory::{HttpApi, ManagementApi};
//!
//! let api = HttpApi::new("http://10.20.0.2:8000/api/v1", None, true);
//! match api.get_request("version") {
//!     Ok(version) => println!("release {}", version["release"]),
//!     Err(e) => eprintln!("{} ({})", e, e.category().advice()),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod error;

pub use api::{AUTH_HEADER, HttpApi, ManagementApi, MockApi};
pub use error::{Error, ErrorCategory, Result};
