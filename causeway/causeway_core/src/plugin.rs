//! Plugin hooks for observing contexts and session creation
//!
//! A context dispatches to at most one bound [`Plugin`]. Hooks run
//! synchronously on the thread that called [`Context::register`],
//! [`Context::session`] or [`Context::join`], and a hook error fails that
//! call. Several observers can share one binding through [`PluginSet`].

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::HookError;
use crate::session::Session;

/// Result returned by plugin hooks
pub type HookResult = std::result::Result<(), HookError>;

/// Observer of context lifecycle and session creation
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use causeway_core::{Context, Plugin, Session};
/// use causeway_core::plugin::HookResult;
///
/// #[derive(Default)]
/// struct CountingPlugin {
///     seen: AtomicUsize,
/// }
///
/// impl Plugin for CountingPlugin {
///     fn init(&self, _context: &Context) -> HookResult {
///         Ok(())
///     }
///
///     fn on_session(&self, _session: &Session) -> HookResult {
///         self.seen.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let plugin = Arc::new(CountingPlugin::default());
/// let ctx = Context::start();
/// ctx.register(plugin.clone()).unwrap();
/// ctx.session().unwrap();
/// assert_eq!(plugin.seen.load(Ordering::SeqCst), 1);
/// ```
pub trait Plugin: Send + Sync {
    /// Called once per [`Context::register`], before it returns
    fn init(&self, context: &Context) -> HookResult;

    /// Called once per created session, before the session is handed out
    fn on_session(&self, session: &Session) -> HookResult;

    /// Get the name of the plugin
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Fans one binding out to several plugins, in insertion order.
///
/// Dispatch stops at the first failing plugin and returns its error.
#[derive(Default, Clone)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin
    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Number of plugins in the set
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Plugin for PluginSet {
    fn init(&self, context: &Context) -> HookResult {
        for plugin in &self.plugins {
            plugin
                .init(context)
                .map_err(|e| HookError::new(format!("{}: {}", plugin.name(), e)))?;
        }
        Ok(())
    }

    fn on_session(&self, session: &Session) -> HookResult {
        for plugin in &self.plugins {
            plugin
                .on_session(session)
                .map_err(|e| HookError::new(format!("{}: {}", plugin.name(), e)))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "plugin_set"
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

/// Plugin that reports registration and every new session through `tracing`
#[derive(Debug, Clone, Default)]
pub struct SessionLogPlugin;

impl Plugin for SessionLogPlugin {
    fn init(&self, context: &Context) -> HookResult {
        tracing::info!(context = context.ordinal(), "session log plugin registered");
        Ok(())
    }

    fn on_session(&self, session: &Session) -> HookResult {
        tracing::info!(
            context = session.context_ordinal(),
            session = session.identity(),
            hops = session.hops(),
            origin = ?session.origin(),
            "session created"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "session_log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::id::{InstanceCounter, SequenceGenerator};
    use crate::logging::NoopSink;
    use parking_lot::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on_session: bool,
    }

    impl Plugin for Recorder {
        fn init(&self, _context: &Context) -> HookResult {
            self.log.lock().push(format!("{}:init", self.tag));
            Ok(())
        }

        fn on_session(&self, session: &Session) -> HookResult {
            self.log
                .lock()
                .push(format!("{}:{}", self.tag, session.identity()));
            if self.fail_on_session {
                return Err(HookError::from("refused"));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            self.tag
        }
    }

    fn context() -> Context {
        Context::builder()
            .config(ContextConfig::minimal_for_testing())
            .generator(Arc::new(SequenceGenerator::new("p")))
            .instance_counter(Arc::new(InstanceCounter::new()))
            .sink(Arc::new(NoopSink))
            .start()
            .unwrap()
    }

    #[test]
    fn test_plugin_set_dispatches_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = PluginSet::new()
            .with(Arc::new(Recorder {
                tag: "a",
                log: log.clone(),
                fail_on_session: false,
            }))
            .with(Arc::new(Recorder {
                tag: "b",
                log: log.clone(),
                fail_on_session: false,
            }));
        assert_eq!(set.len(), 2);

        let ctx = context();
        ctx.register(Arc::new(set)).unwrap();
        ctx.session().unwrap();

        assert_eq!(*log.lock(), vec!["a:init", "b:init", "a:p-0", "b:p-0"]);
    }

    #[test]
    fn test_plugin_set_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = PluginSet::new()
            .with(Arc::new(Recorder {
                tag: "first",
                log: log.clone(),
                fail_on_session: true,
            }))
            .with(Arc::new(Recorder {
                tag: "second",
                log: log.clone(),
                fail_on_session: false,
            }));

        let ctx = context();
        ctx.register(Arc::new(set)).unwrap();
        let err = ctx.session().unwrap_err();

        assert!(err.to_string().contains("first: refused"));
        assert!(!log.lock().iter().any(|entry| entry.starts_with("second:p")));
        assert_eq!(ctx.session_count(), 0);
    }

    #[test]
    fn test_default_name_is_type_name() {
        struct Quiet;
        impl Plugin for Quiet {
            fn init(&self, _context: &Context) -> HookResult {
                Ok(())
            }
            fn on_session(&self, _session: &Session) -> HookResult {
                Ok(())
            }
        }

        assert!(Quiet.name().ends_with("Quiet"));
        assert_eq!(SessionLogPlugin.name(), "session_log");
    }
}
