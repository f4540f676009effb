//! Pure decoding routines shared by provider handlers.
//!
//! Nothing in this module touches the network; every function is
//! deterministic and cheap enough to run inline inside an async task.

pub mod base64;
pub mod cipher;
pub mod error;
pub mod packer;
pub mod transform;

pub use error::DecodeError;
