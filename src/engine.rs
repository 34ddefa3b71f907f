//! Contract for the external TextMate grammar engine, plus the lock that
//! serializes access to the single engine instance.
//!
//! The engine is expensive to construct and stateful: `set_theme` mutates
//! state read by every later `tokenize_line*` call, so exactly one holder
//! may use it at a time.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::VermiglioResult;
use crate::themes::raw::RawThemeRule;
use crate::tokenize::FullToken;

/// Engine-local grammar handle returned by [`GrammarEngine::load_grammar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarId(pub u16);

/// Opaque tokenizer state carried from one line to the next.
/// The engine defines the concrete type; callers only thread it through.
pub trait RuleStack: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

/// Output of [`GrammarEngine::tokenize_line`]: scope-path tokens plus the
/// state to feed into the next line.
#[derive(Debug)]
pub struct TokenizedLine {
    pub tokens: Vec<FullToken>,
    pub stack: Box<dyn RuleStack>,
}

/// Output of [`GrammarEngine::tokenize_line2`]: the compact encoding as
/// `(start, metadata)` pairs flattened into one array, plus the next state.
#[derive(Debug)]
pub struct TokenizedLine2 {
    pub data: Vec<u32>,
    pub stack: Box<dyn RuleStack>,
}

/// The grammar engine contract. One live instance per process, one active
/// theme at a time.
pub trait GrammarEngine {
    /// Replaces the active theme with the given rule list. The first rule is
    /// expected to be the default rule and always wins as the base style.
    fn set_theme(&mut self, rules: &[RawThemeRule]);

    /// The color table of the active theme. Index 0 is reserved/unused;
    /// token metadata color indices are 1-based into this table.
    fn color_map(&self) -> Vec<String>;

    /// Loads (or fetches the already-loaded) grammar for a scope name.
    /// Returns `None` when no grammar exists for the scope.
    fn load_grammar(&mut self, scope_name: &str, language_id: u32) -> Option<GrammarId>;

    /// Tokenizes one line into scope-path tokens, starting from `prior`
    /// (or the grammar's initial state when `None`).
    fn tokenize_line(
        &mut self,
        grammar: GrammarId,
        line: &str,
        prior: Option<&dyn RuleStack>,
    ) -> VermiglioResult<TokenizedLine>;

    /// Tokenizes one line into the packed binary encoding.
    fn tokenize_line2(
        &mut self,
        grammar: GrammarId,
        line: &str,
        prior: Option<&dyn RuleStack>,
    ) -> VermiglioResult<TokenizedLine2>;
}

type EngineFactory = Box<dyn Fn() -> Box<dyn GrammarEngine + Send> + Send + Sync>;

struct LockState {
    now_serving: u64,
    engine: Option<Box<dyn GrammarEngine + Send>>,
}

/// Serializes access to the shared grammar engine.
///
/// Tickets hand out strict FIFO ordering: `acquire` returns only once every
/// earlier acquirer has dropped its guard. The engine itself is constructed
/// lazily by the first acquirer, under the lock, so it cannot be built twice.
pub struct EngineLock {
    factory: EngineFactory,
    next_ticket: AtomicU64,
    state: Mutex<LockState>,
    released: Condvar,
}

impl fmt::Debug for EngineLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLock").finish_non_exhaustive()
    }
}

impl EngineLock {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn GrammarEngine + Send> + Send + Sync + 'static,
    {
        EngineLock {
            factory: Box::new(factory),
            next_ticket: AtomicU64::new(0),
            state: Mutex::new(LockState {
                now_serving: 0,
                engine: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Blocks until every earlier acquirer has released, then hands out
    /// exclusive engine access. Release happens when the guard drops.
    pub fn acquire(&self) -> EngineGuard<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().expect("engine lock poisoned");
        while state.now_serving != ticket {
            state = self.released.wait(state).expect("engine lock poisoned");
        }
        if state.engine.is_none() {
            state.engine = Some((self.factory)());
        }
        EngineGuard {
            lock: self,
            state: Some(state),
        }
    }
}

/// Exclusive handle on the shared grammar engine. Dropping it wakes the next
/// waiter in ticket order.
pub struct EngineGuard<'l> {
    lock: &'l EngineLock,
    state: Option<std::sync::MutexGuard<'l, LockState>>,
}

impl Deref for EngineGuard<'_> {
    type Target = dyn GrammarEngine + Send;

    fn deref(&self) -> &Self::Target {
        self.state
            .as_ref()
            .and_then(|s| s.engine.as_deref())
            .expect("engine initialized in acquire")
    }
}

impl DerefMut for EngineGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
            .as_mut()
            .and_then(|s| s.engine.as_deref_mut())
            .expect("engine initialized in acquire")
    }
}

impl Drop for EngineGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.now_serving += 1;
            drop(state);
            self.lock.released.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::MockEngine;

    #[test]
    fn engine_is_constructed_once() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        let lock = EngineLock::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(MockEngine::new()) as Box<dyn GrammarEngine + Send>
        });

        for _ in 0..3 {
            let guard = lock.acquire();
            drop(guard);
        }
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn holders_are_mutually_exclusive() {
        let lock = Arc::new(EngineLock::new(|| {
            Box::new(MockEngine::new()) as Box<dyn GrammarEngine + Send>
        }));
        let active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let active = Arc::clone(&active);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let _guard = lock.acquire();
                    let holders = active.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(holders, 0, "another holder was active inside the lock");
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn guard_gives_engine_access() {
        let lock = EngineLock::new(|| {
            Box::new(MockEngine::new().with_grammar("source.js")) as Box<dyn GrammarEngine + Send>
        });
        let mut guard = lock.acquire();
        assert!(guard.load_grammar("source.js", 1).is_some());
        assert!(guard.load_grammar("source.unknown", 1).is_none());
    }
}
