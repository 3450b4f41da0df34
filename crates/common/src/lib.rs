//! Common types shared by the board client crates

mod error;
mod origin;
mod secret;

pub use error::{Error, Result};
pub use origin::ApiOrigin;
pub use secret::Secret;
