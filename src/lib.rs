pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod install;
pub mod protocol;

pub use error::{CredentialError, Result};
