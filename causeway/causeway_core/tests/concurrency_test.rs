//! Integration tests for contexts shared between threads.
//!
//! These tests verify that session creation stays serialized per context:
//! counters never lose increments, minted identities never repeat and a
//! panicking hook or plugin init leaves the context usable.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use causeway_core::plugin::HookResult;
use causeway_core::{Context, ContextConfig, InstanceCounter, NoopSink, Plugin, Result, Session};
use parking_lot::Mutex;

fn shared_context(counter: &Arc<InstanceCounter>) -> Context {
    let mut config = ContextConfig::minimal_for_testing();
    config.duplicate_window = 10_000;

    Context::builder()
        .config(config)
        .instance_counter(counter.clone())
        .sink(Arc::new(NoopSink))
        .start()
        .expect("test config is valid")
}

/// Collects every identity it observes
#[derive(Default)]
struct Collector {
    seen: Mutex<Vec<String>>,
}

impl Plugin for Collector {
    fn init(&self, _context: &Context) -> HookResult {
        Ok(())
    }

    fn on_session(&self, session: &Session) -> HookResult {
        self.seen.lock().push(session.identity().to_string());
        Ok(())
    }
}

#[test]
fn test_two_threads_thousand_sessions_each() {
    let ctx = shared_context(&Arc::new(InstanceCounter::new()));
    let collector = Arc::new(Collector::default());
    ctx.register(collector.clone()).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                (0..1000)
                    .map(|_| ctx.session().unwrap().identity().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut identities = HashSet::new();
    for handle in handles {
        for identity in handle.join().unwrap() {
            assert!(identities.insert(identity), "identity minted twice");
        }
    }

    assert_eq!(identities.len(), 2000);
    assert_eq!(ctx.session_count(), 2000);
    assert_eq!(collector.seen.lock().len(), 2000);
}

#[test]
fn test_each_thread_creates_once() {
    const THREADS: usize = 16;

    let ctx = shared_context(&Arc::new(InstanceCounter::new()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let ctx = ctx.clone();
            let barrier = barrier.clone();
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                if i % 2 == 0 {
                    ctx.session().map(|_| ())
                } else {
                    let token = ctx.session()?.externalize();
                    ctx.join(&token).map(|_| ())
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // Odd threads mint and join, even threads only mint.
    assert_eq!(ctx.session_count(), (THREADS + THREADS / 2) as u64);
}

#[test]
fn test_concurrent_contexts_get_unique_ordinals() {
    let counter = Arc::new(InstanceCounter::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| shared_context(&counter).ordinal())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ordinals = HashSet::new();
    for handle in handles {
        for ordinal in handle.join().unwrap() {
            assert!(ordinals.insert(ordinal));
        }
    }

    assert_eq!(ordinals.len(), 200);
    assert_eq!(counter.issued(), 200);
    assert_eq!(ordinals.iter().max().copied(), Some(199));
}

#[test]
fn test_minted_identities_unique_across_contexts() {
    let counter = Arc::new(InstanceCounter::new());
    let contexts: Vec<_> = (0..4).map(|_| shared_context(&counter)).collect();

    let mut identities = HashSet::new();
    for ctx in &contexts {
        for _ in 0..100 {
            assert!(identities.insert(ctx.session().unwrap().identity().to_string()));
        }
    }
    assert_eq!(identities.len(), 400);
}

#[test]
fn test_stop_races_with_creation() {
    let ctx = shared_context(&Arc::new(InstanceCounter::new()));
    let created = Arc::new(Mutex::new(0u64));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            let created = created.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    match ctx.session() {
                        Ok(_) => *created.lock() += 1,
                        Err(_) => break,
                    }
                }
            })
        })
        .collect();

    thread::yield_now();
    ctx.stop();

    for worker in workers {
        worker.join().unwrap();
    }

    // Every success was counted and nothing succeeds afterwards.
    assert_eq!(ctx.session_count(), *created.lock());
    assert!(ctx.session().is_err());
}

#[test]
fn test_panicking_hook_leaves_context_usable() {
    struct PanicOnce {
        armed: AtomicBool,
    }

    impl Plugin for PanicOnce {
        fn init(&self, _context: &Context) -> HookResult {
            Ok(())
        }

        fn on_session(&self, _session: &Session) -> HookResult {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("hook exploded");
            }
            Ok(())
        }
    }

    let ctx = shared_context(&Arc::new(InstanceCounter::new()));
    ctx.register(Arc::new(PanicOnce {
        armed: AtomicBool::new(true),
    }))
    .unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.session()));
    assert!(result.is_err());
    assert_eq!(ctx.session_count(), 0);

    // The lock was released during unwinding.
    let other = ctx.clone();
    let session = thread::spawn(move || other.session().map(|s| s.identity().to_string()))
        .join()
        .unwrap();
    assert!(session.is_ok());
    assert_eq!(ctx.session_count(), 1);
}

#[test]
fn test_panicking_init_restores_previous_binding() {
    struct PanicInit;

    impl Plugin for PanicInit {
        fn init(&self, _context: &Context) -> HookResult {
            panic!("init exploded");
        }

        fn on_session(&self, _session: &Session) -> HookResult {
            Ok(())
        }

        fn name(&self) -> &str {
            "panic_init"
        }
    }

    let ctx = shared_context(&Arc::new(InstanceCounter::new()));
    let collector = Arc::new(Collector::default());
    ctx.register(collector.clone()).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.register(Arc::new(PanicInit))));
    assert!(result.is_err());
    assert_ne!(ctx.plugin_name().as_deref(), Some("panic_init"));

    // The original plugin still observes new sessions.
    ctx.session().unwrap();
    assert_eq!(collector.seen.lock().len(), 1);

    // Without a previous binding the slot is left empty.
    let fresh = shared_context(&Arc::new(InstanceCounter::new()));
    let result = panic::catch_unwind(AssertUnwindSafe(|| fresh.register(Arc::new(PanicInit))));
    assert!(result.is_err());
    assert_eq!(fresh.plugin_name(), None);
}
