//! Ownership scopes for effects.
//!
//! A scope stands in for the lifetime of a host-side owner, such as a UI
//! component. Effects created through a scope are disposed when the scope is
//! torn down, either explicitly with [`Scope::dispose`] or when the last handle
//! to the scope is dropped. Child scopes are torn down before their parent's
//! effects.
//!
//! Effects created with [`EffectOptions::manual_cleanup`] are not adopted: they
//! outlive the scope and must be disposed by hand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::effect::{Effect, EffectOptions, OnCleanup};

/// Unique identifier for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct ScopeInner {
    id: ScopeId,
    effects: Mutex<Vec<Effect>>,
    children: Mutex<Vec<Scope>>,
    disposed: AtomicBool,
}

impl ScopeInner {
    fn teardown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let children = std::mem::take(&mut *self.children.lock());
        let effects = std::mem::take(&mut *self.effects.lock());
        debug!(
            scope = ?self.id,
            children = children.len(),
            effects = effects.len(),
            "scope torn down"
        );

        for child in children {
            child.dispose();
        }
        for effect in effects {
            effect.dispose();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// An owner of effects and child scopes.
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create a new, empty scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::new(),
                effects: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Create an effect owned by this scope.
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: FnMut(&mut OnCleanup) + Send + 'static,
    {
        self.effect_with_options(run, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    ///
    /// With `manual_cleanup` set, the effect is not owned by this scope.
    pub fn effect_with_options<F>(&self, run: F, options: EffectOptions) -> Effect
    where
        F: FnMut(&mut OnCleanup) + Send + 'static,
    {
        let effect = Effect::with_options(run, options);
        self.adopt(effect.clone());
        effect
    }

    /// Take ownership of an existing effect.
    ///
    /// Effects created with `manual_cleanup` are left alone. Adopting into a
    /// scope that has already been torn down disposes the effect immediately.
    /// Effects disposed on their own since the last adoption are dropped from
    /// the scope.
    pub fn adopt(&self, effect: Effect) {
        if effect.options().manual_cleanup {
            return;
        }
        if self.is_disposed() {
            warn!(scope = ?self.inner.id, effect = ?effect.id(), "adopted by a disposed scope");
            effect.dispose();
            return;
        }

        let mut effects = self.inner.effects.lock();
        effects.retain(|owned| !owned.is_disposed());
        effects.push(effect);
    }

    /// Create a child scope, torn down together with this one.
    pub fn child(&self) -> Scope {
        let child = Scope::new();
        if self.is_disposed() {
            child.dispose();
        } else {
            self.inner.children.lock().push(child.clone());
        }
        child
    }

    /// Dispose every owned effect and child scope.
    ///
    /// Idempotent. Dropping the last handle has the same effect.
    pub fn dispose(&self) {
        self.inner.teardown();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of owned effects that are still live.
    pub fn effect_count(&self) -> usize {
        self.inner
            .effects
            .lock()
            .iter()
            .filter(|effect| !effect.is_disposed())
            .count()
    }

    /// Number of child scopes currently owned.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("effect_count", &self.effect_count())
            .field("child_count", &self.child_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
