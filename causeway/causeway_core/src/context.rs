//! The per-process coordinator that mints and joins sessions
//!
//! Every creation step (stopped check, identity generation, duplicate check,
//! plugin dispatch, counter increment) runs under one re-entrant lock, so a
//! context shared by many threads hands out sessions one at a time and its
//! plugin sees them in that order. The lock is re-entrant so hooks may call
//! back into the context on the same thread.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ContextConfig;
use crate::error::CausewayError;
use crate::id::{process_counter, IdentityGenerator, InstanceCounter, UuidGenerator};
use crate::logging::{LogSink, Logger, TracingSink};
use crate::plugin::Plugin;
use crate::session::Session;
use crate::token::{TokenCodec, TokenPayload};
use crate::Result;

/// Recently minted identities, bounded to a fixed window
#[derive(Debug)]
struct RecentIdentities {
    window: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentIdentities {
    fn new(window: usize) -> Self {
        Self {
            window,
            order: VecDeque::with_capacity(window.min(1024)),
            members: HashSet::with_capacity(window.min(1024)),
        }
    }

    fn contains(&self, identity: &str) -> bool {
        self.members.contains(identity)
    }

    fn insert(&mut self, identity: String) {
        if self.window == 0 {
            return;
        }

        if self.order.len() == self.window {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }

        self.members.insert(identity.clone());
        self.order.push_back(identity);
    }
}

/// Puts the previous plugin binding back unless disarmed, including on unwind
struct RestoreBinding<'a> {
    slot: &'a RwLock<Option<Arc<dyn Plugin>>>,
    previous: Option<Option<Arc<dyn Plugin>>>,
}

impl RestoreBinding<'_> {
    fn disarm(mut self) -> Option<Arc<dyn Plugin>> {
        self.previous.take().flatten()
    }
}

impl Drop for RestoreBinding<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot.write() = previous;
        }
    }
}

/// Shared state behind a [`Context`] handle
pub(crate) struct ContextInner {
    pub(crate) ordinal: u64,
    pub(crate) logger: Logger,
    pub(crate) codec: TokenCodec,
    config: ContextConfig,
    generator: Arc<dyn IdentityGenerator>,
    session_count: AtomicU64,
    stopped: AtomicBool,
    plugin: RwLock<Option<Arc<dyn Plugin>>>,
    recent: Mutex<RecentIdentities>,
    dispatch: ReentrantMutex<()>,
}

impl fmt::Debug for ContextInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInner")
            .field("ordinal", &self.ordinal)
            .field("session_count", &self.session_count.load(Ordering::SeqCst))
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

/// Per-process coordinator for sessions.
///
/// `Context` is a cheap handle; clones share the same ordinal, counters and
/// plugin binding.
///
/// # Examples
///
/// ```
/// use causeway_core::Context;
///
/// let ctx = Context::start();
/// let session = ctx.session().unwrap();
/// let token = session.externalize();
///
/// let remote = Context::start();
/// let joined = remote.join(&token).unwrap();
/// assert_eq!(joined.identity(), session.identity());
///
/// remote.stop();
/// ctx.stop();
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Start a context with the default configuration, random UUID
    /// identities, the process-wide ordinal counter and a `tracing` sink
    pub fn start() -> Self {
        Self::builder().build()
    }

    /// Configure a context before starting it
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    /// Ordinal assigned when the context started
    pub fn ordinal(&self) -> u64 {
        self.inner.ordinal
    }

    /// Number of sessions created by `session` and `join`
    pub fn session_count(&self) -> u64 {
        self.inner.session_count.load(Ordering::SeqCst)
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Name of the bound plugin
    pub fn plugin_name(&self) -> Option<String> {
        self.inner
            .plugin
            .read()
            .as_ref()
            .map(|plugin| plugin.name().to_string())
    }

    /// The configuration the context was started with
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// The logger sessions of this context write through
    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// The codec used to decode joined tokens
    pub fn codec(&self) -> &TokenCodec {
        &self.inner.codec
    }

    /// Bind a plugin and run its `init` hook.
    ///
    /// Replaces any existing binding. The new plugin is already bound while
    /// `init` runs. If `init` fails or panics the previous binding is
    /// restored.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let _guard = self.inner.dispatch.lock();
        self.ensure_running("register")?;

        let previous = self.inner.plugin.write().replace(plugin.clone());
        let restore = RestoreBinding {
            slot: &self.inner.plugin,
            previous: Some(previous),
        };

        if let Err(source) = plugin.init(self) {
            warn!(
                context = self.inner.ordinal,
                plugin = plugin.name(),
                error = %source,
                "plugin init failed"
            );
            drop(restore);
            return Err(CausewayError::PluginInit {
                plugin: plugin.name().to_string(),
                source,
            });
        }

        let previous = restore.disarm();
        info!(
            context = self.inner.ordinal,
            plugin = plugin.name(),
            replaced = previous.is_some(),
            "plugin registered"
        );
        Ok(())
    }

    /// Mint a new session with a fresh identity.
    ///
    /// The generated identity must pass the same checks `join` applies to a
    /// token, otherwise [`CausewayError::Unencodable`] is returned.
    pub fn session(&self) -> Result<Session> {
        let _guard = self.inner.dispatch.lock();
        self.ensure_running("session")?;

        let identity = self.inner.generator.next_identity();
        let payload = TokenPayload::from_identity(identity.clone());
        if let Err(e) = self.inner.codec.check(&payload) {
            warn!(
                context = self.inner.ordinal,
                generator = self.inner.generator.name(),
                error = %e,
                "generated identity cannot be carried in a token"
            );
            return Err(CausewayError::Unencodable(e));
        }

        if self.inner.recent.lock().contains(&identity) {
            warn!(
                context = self.inner.ordinal,
                generator = self.inner.generator.name(),
                identity = %identity,
                "duplicate identity generated"
            );
            return Err(CausewayError::DuplicateIdentity { identity });
        }

        let session = Session::from_payload(payload, &self.inner);
        self.notify(&session)?;

        self.inner.recent.lock().insert(identity);
        let count = self.inner.session_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            context = self.inner.ordinal,
            session = session.identity(),
            sessions = count,
            "session minted"
        );
        Ok(session)
    }

    /// Reconstruct a session from a token produced by [`Session::externalize`]
    pub fn join(&self, token: impl AsRef<str>) -> Result<Session> {
        let _guard = self.inner.dispatch.lock();
        self.ensure_running("join")?;

        let mut payload = self.inner.codec.decode(token.as_ref()).map_err(|e| {
            warn!(context = self.inner.ordinal, error = %e, "rejected session token");
            e
        })?;
        payload.hops = payload.hops.saturating_add(1);

        let session = Session::from_payload(payload, &self.inner);
        self.notify(&session)?;

        let count = self.inner.session_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            context = self.inner.ordinal,
            session = session.identity(),
            origin = ?session.origin(),
            hops = session.hops(),
            sessions = count,
            "session joined"
        );
        Ok(session)
    }

    /// Stop the context and release its plugin binding. Safe to call repeatedly.
    pub fn stop(&self) {
        let _guard = self.inner.dispatch.lock();
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let plugin = self.inner.plugin.write().take();
        info!(
            context = self.inner.ordinal,
            sessions = self.session_count(),
            plugin = plugin.as_ref().map(|p| p.name()),
            "context stopped"
        );
    }

    fn ensure_running(&self, operation: &'static str) -> Result<()> {
        if self.is_stopped() {
            return Err(CausewayError::UseAfterStop {
                ordinal: self.inner.ordinal,
                operation,
            });
        }
        Ok(())
    }

    fn notify(&self, session: &Session) -> Result<()> {
        let plugin = self.inner.plugin.read().clone();
        if let Some(plugin) = plugin {
            plugin
                .on_session(session)
                .map_err(|source| CausewayError::PluginHook {
                    plugin: plugin.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({} {})", self.ordinal(), self.session_count())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("ordinal", &self.ordinal())
            .field("session_count", &self.session_count())
            .field("stopped", &self.is_stopped())
            .field("plugin", &self.plugin_name())
            .finish()
    }
}

/// Builder for a [`Context`] with injected collaborators
#[derive(Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    generator: Option<Arc<dyn IdentityGenerator>>,
    sink: Option<Arc<dyn LogSink>>,
    counter: Option<Arc<InstanceCounter>>,
}

impl ContextBuilder {
    /// Use the given configuration
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given identity generator
    pub fn generator(mut self, generator: Arc<dyn IdentityGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Write session logs to the given sink
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Take the ordinal from the given counter instead of the process-wide one
    pub fn instance_counter(mut self, counter: Arc<InstanceCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Validate the configuration and start the context
    pub fn start(self) -> Result<Context> {
        self.config.validate()?;
        Ok(self.build())
    }

    fn build(self) -> Context {
        let counter = self.counter.unwrap_or_else(process_counter);
        let ordinal = counter.next();
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(UuidGenerator) as Arc<dyn IdentityGenerator>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn LogSink>);

        debug!(
            context = ordinal,
            generator = generator.name(),
            sink = sink.name(),
            "context started"
        );

        let inner = ContextInner {
            ordinal,
            logger: Logger::new(sink, self.config.logging.clone()),
            codec: TokenCodec::new(&self.config.token),
            recent: Mutex::new(RecentIdentities::new(self.config.duplicate_window)),
            config: self.config,
            generator,
            session_count: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            plugin: RwLock::new(None),
            dispatch: ReentrantMutex::new(()),
        };

        Context {
            inner: Arc::new(inner),
        }
    }
}
