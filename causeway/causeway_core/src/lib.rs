//! # Causeway
//!
//! Session identity propagation for correlating work that spans threads,
//! tasks and processes.
//!
//! ## Features
//!
//! - **Contexts**: a per-process coordinator that mints sessions and counts them
//! - **Sessions**: identified units of work with baggage, deadlines and tagged logging
//! - **Tokens**: a compact, validated wire form for carrying a session to another process
//! - **Plugins**: synchronous hooks observing registration and session creation
//!
//! ## Example
//!
//! ```
//! use causeway_core::{Context, CONTEXT_HEADER};
//!
//! let frontend = Context::start();
//! let request = frontend
//!     .session()
//!     .unwrap()
//!     .with_baggage("tenant", "acme")
//!     .unwrap();
//! request.log("accepted request");
//!
//! // Carry the token to the next service, e.g. as an HTTP header.
//! let header = (CONTEXT_HEADER, request.externalize().into_string());
//!
//! let backend = Context::start();
//! let handled = backend.join(&header.1).unwrap();
//! assert_eq!(handled.identity(), request.identity());
//! assert_eq!(handled.property("tenant"), Some("acme"));
//! assert_eq!(handled.hops(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export tracing for convenience
pub use tracing;

pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod logging;
pub mod plugin;
pub mod session;
pub mod token;

pub use config::{ContextConfig, LoggingConfig, TokenConfig};
pub use context::{Context, ContextBuilder};
pub use error::{CausewayError, DecodeError, HookError};
pub use id::{process_counter, IdentityGenerator, InstanceCounter, SequenceGenerator, UuidGenerator};
pub use logging::{LogLevel, LogRecord, LogSink, Logger, MemorySink, NoopSink, TracingSink};
pub use plugin::{HookResult, Plugin, PluginSet, SessionLogPlugin};
pub use session::Session;
pub use token::{Token, TokenCodec, TokenPayload, CONTEXT_HEADER};

/// Result type for context and session operations
pub type Result<T> = std::result::Result<T, CausewayError>;
