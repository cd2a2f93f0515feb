//! Network addressing types

pub mod endpoint;

pub use endpoint::Endpoint;

/// Port every default address uses
pub const DEFAULT_PORT: u16 = 4444;
