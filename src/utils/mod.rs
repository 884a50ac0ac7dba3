pub mod error;
pub mod paths;

pub use error::{BridgeError, BridgeResult};
pub use paths::*;
