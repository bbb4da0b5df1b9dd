//! Core types for Turnpike.

pub mod message;
pub mod request;
pub mod settings;
pub mod stream;
pub mod usage;

pub use message::*;
pub use request::*;
pub use settings::*;
pub use stream::*;
pub use usage::*;
