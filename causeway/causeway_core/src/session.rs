//! Sessions: identified units of causally related work
//!
//! A session is minted by [`Context::session`] or reconstructed from a token
//! by [`Context::join`]. Once handed out it never changes; the builder
//! methods ([`Session::with_baggage`], [`Session::with_timeout`]) return a
//! new value that keeps the same identity. Every session a context hands
//! out externalizes to a token that context can join.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thread_local::ThreadLocal;

use crate::context::{Context, ContextInner};
use crate::error::CausewayError;
use crate::logging::{LogLevel, LogRecord, Logger};
use crate::token::{Token, TokenCodec, TokenPayload};
use crate::Result;

/// Session bound to the current thread by [`Session::with_current`]
static CURRENT_SESSION: Lazy<ThreadLocal<RwLock<Option<Session>>>> = Lazy::new(ThreadLocal::new);

/// Category used by [`Session::log`]
pub const DEFAULT_CATEGORY: &str = "session";

/// A unit of causally related work
#[derive(Debug, Clone)]
pub struct Session {
    identity: Arc<str>,
    context: Weak<ContextInner>,
    context_ordinal: u64,
    origin: Option<u64>,
    hops: u32,
    baggage: BTreeMap<String, String>,
    deadline: Option<DateTime<Utc>>,
    logger: Logger,
    codec: TokenCodec,
}

impl Session {
    /// Build a session owned by `owner` from a decoded or freshly minted payload.
    /// `origin` and `hops` are taken verbatim; the caller adjusts them for joins.
    pub(crate) fn from_payload(payload: TokenPayload, owner: &Arc<ContextInner>) -> Self {
        Self {
            identity: Arc::from(payload.identity),
            context: Arc::downgrade(owner),
            context_ordinal: owner.ordinal,
            origin: payload.origin,
            hops: payload.hops,
            baggage: payload.baggage,
            deadline: payload.deadline,
            logger: owner.logger.clone(),
            codec: owner.codec.clone(),
        }
    }

    /// The session's identity
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Ordinal of the context that created this local session
    pub fn context_ordinal(&self) -> u64 {
        self.context_ordinal
    }

    /// The owning context, if it is still alive
    pub fn context(&self) -> Option<Context> {
        self.context.upgrade().map(Context::from_inner)
    }

    /// Ordinal of the context whose token this session was joined from
    pub fn origin(&self) -> Option<u64> {
        self.origin
    }

    /// Number of process boundaries crossed to reach this session
    pub fn hops(&self) -> u32 {
        self.hops
    }

    /// Properties travelling with the session
    pub fn baggage(&self) -> &BTreeMap<String, String> {
        &self.baggage
    }

    /// Look up a single baggage property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.baggage.get(key).map(String::as_str)
    }

    /// Add a baggage property.
    ///
    /// Fails with [`CausewayError::Unencodable`] if the key is empty or the
    /// session's token would outgrow the configured `max_token_len`.
    pub fn with_baggage(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        self.baggage.insert(key.into(), value.into());
        self.codec
            .check(&self.payload())
            .map_err(CausewayError::Unencodable)?;
        Ok(self)
    }

    /// The absolute deadline, if one was set
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Set an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline `timeout` from now. An earlier existing deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));

        match deadline {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Time left before the deadline; zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    /// Serialize the session for another process to [`Context::join`]
    pub fn externalize(&self) -> Token {
        self.codec.encode(&self.payload())
    }

    fn payload(&self) -> TokenPayload {
        TokenPayload {
            identity: self.identity.to_string(),
            origin: Some(self.context_ordinal),
            hops: self.hops,
            baggage: self.baggage.clone(),
            deadline: self.deadline,
        }
    }

    /// Log a message at info level
    pub fn log(&self, message: impl Into<String>) {
        self.log_at(LogLevel::Info, DEFAULT_CATEGORY, message);
    }

    /// Log a message with an explicit level and category
    pub fn log_at(&self, level: LogLevel, category: impl Into<String>, message: impl Into<String>) {
        if !self.logger.enabled(level) {
            return;
        }

        let mut record = LogRecord::new(level, category, message);
        record.session = self.identity.to_string();
        record.context = self.context_ordinal;
        record.hops = self.hops;
        record.origin = self.origin;
        self.logger.emit(&record);
    }

    /// Log at critical level
    pub fn critical(&self, category: impl Into<String>, message: impl Into<String>) {
        self.log_at(LogLevel::Critical, category, message);
    }

    /// Log at error level
    pub fn error(&self, category: impl Into<String>, message: impl Into<String>) {
        self.log_at(LogLevel::Error, category, message);
    }

    /// Log at warn level
    pub fn warn(&self, category: impl Into<String>, message: impl Into<String>) {
        self.log_at(LogLevel::Warn, category, message);
    }

    /// Log at info level
    pub fn info(&self, category: impl Into<String>, message: impl Into<String>) {
        self.log_at(LogLevel::Info, category, message);
    }

    /// Log at debug level
    pub fn debug(&self, category: impl Into<String>, message: impl Into<String>) {
        self.log_at(LogLevel::Debug, category, message);
    }

    /// A `tracing` span carrying this session's identity
    pub fn tracing_span(&self) -> tracing::Span {
        tracing::info_span!(
            "session",
            id = %self.identity,
            context = self.context_ordinal,
            hops = self.hops
        )
    }

    /// Get the session bound to the current thread
    pub fn current() -> Option<Self> {
        CURRENT_SESSION.get_or(|| RwLock::new(None)).read().clone()
    }

    /// Bind a session to the current thread
    pub fn set_current(session: Option<Self>) {
        *CURRENT_SESSION.get_or(|| RwLock::new(None)).write() = session;
    }

    /// Execute a function with this session bound to the current thread
    pub fn with_current<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _restore = RestoreCurrent(Self::current());
        Self::set_current(Some(self.clone()));
        f()
    }
}

/// Puts the previously current session back, including on unwind
struct RestoreCurrent(Option<Session>);

impl Drop for RestoreCurrent {
    fn drop(&mut self) {
        Session::set_current(self.0.take());
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({} {})", self.context_ordinal, self.identity)
    }
}
