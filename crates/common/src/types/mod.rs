use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// `{success, message}` envelope shared by every mutating endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionMessage {
    pub success: bool,
    pub message: String,
}

impl ActionMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}
