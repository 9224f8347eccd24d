//! Sheetload Common Library
//!
//! Shared utilities and error handling for the Sheetload workspace.
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: SHA-256 helpers used for row content hashes
//!
//! # Example
//!
//! ```no_run
//! use sheetload_common::checksum::sha256_hex;
//! use sheetload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> sheetload_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     println!("{}", sha256_hex("hello world"));
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
