//! Logging utilities.
//!
//! Renderers log through the `log` facade. This module only owns the
//! `env_logger` initialization used by binaries and tests that want output.

mod init;

pub use init::{init_logging, LoggingConfig};
