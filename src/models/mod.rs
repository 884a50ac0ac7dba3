// Data models (structs)
pub mod media;
pub mod job;
pub mod settings;

pub use media::*;
pub use job::*;
pub use settings::*;
