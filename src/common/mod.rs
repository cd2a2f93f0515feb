//! Common traits and types used across the acksrv library
//!
//! This module contains the core traits that define the interface
//! for acknowledgement servers and one-shot exchange clients.

pub mod lifecycle;
pub mod receipt;
pub mod test_utils;
pub mod traits;

pub use receipt::{Decoding, Receipt};
pub use test_utils::{RunningServer, spawn_server};
pub use traits::{AckServer, ExchangeClient};
