//! Remote file browser error types

use thiserror::Error;

use super::names::NameError;
use crate::bridge::BridgeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SftpError {
    #[error("No active session")]
    NoSession,

    #[error("Path must not be empty")]
    EmptyInput,

    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

// Serialized as a plain message for the UI layer
impl serde::Serialize for SftpError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
