//! Contains the types needed to configure a [`Client`](crate::Client) and to identify servers.
//!
//! Options structs in this module use the
//! [`typed-builder`](https://crates.io/crates/typed-builder) crate to derive a type-safe builder
//! API on them:
//!
//! ```rust
//! # use std::time::Duration;
//! # use mongodb_driver_core::options::ClientOptions;
//! let options = ClientOptions::builder()
//!     .server_selection_timeout(Duration::from_secs(5))
//!     .build();
//! ```

pub use crate::client::options::{ClientOptions, ServerAddress, DEFAULT_PORT};
