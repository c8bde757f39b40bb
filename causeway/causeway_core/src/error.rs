//! Error types for session propagation

use thiserror::Error;

/// Error type for context and session operations
#[derive(Error, Debug)]
pub enum CausewayError {
    /// A token could not be decoded into a session identity
    #[error("Failed to decode session token: {0}")]
    Decode(#[from] DecodeError),

    /// A session would externalize to a token its own codec rejects
    #[error("Session cannot be carried in a token: {0}")]
    Unencodable(#[source] DecodeError),

    /// The identity generator produced an identity this context already minted
    #[error("Identity generator produced a duplicate identity: {identity}")]
    DuplicateIdentity {
        /// The colliding identity
        identity: String,
    },

    /// An operation was attempted on a stopped context
    #[error("Context {ordinal} is stopped; {operation} is not allowed")]
    UseAfterStop {
        /// Ordinal of the stopped context
        ordinal: u64,
        /// The rejected operation
        operation: &'static str,
    },

    /// A plugin failed while being initialized by `register`
    #[error("Plugin {plugin} failed to initialize: {source}")]
    PluginInit {
        /// Name of the failing plugin
        plugin: String,
        /// The hook's error
        #[source]
        source: HookError,
    },

    /// A plugin failed while observing a new session
    #[error("Plugin {plugin} failed in on_session: {source}")]
    PluginHook {
        /// Name of the failing plugin
        plugin: String,
        /// The hook's error
        #[source]
        source: HookError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Reasons a token is rejected by the codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The token was empty
    #[error("token is empty")]
    Empty,

    /// The token exceeds the configured maximum length
    #[error("token is {len} bytes, maximum is {max}")]
    TooLong {
        /// Length of the rejected token
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// The token is not a well-formed token document
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token was produced by an unknown codec version
    #[error("unsupported token version {0}")]
    UnsupportedVersion(u32),

    /// The identity carried by the token is not acceptable
    #[error("invalid identity in token: {0}")]
    InvalidIdentity(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Error returned by plugin hooks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Create a hook error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The hook's message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        HookError::new(message)
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        HookError::new(message)
    }
}
