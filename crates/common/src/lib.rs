//! Common types shared by the token dealer crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
