//! Reactive path-addressable state store.
//!
//! The store holds a single [`Value`] tree keyed by slash-delimited
//! [`Path`]s. Every mutation notifies subscribers of the changed path and
//! of every ancestor/descendant path, synchronously, before the mutating
//! call returns. Two subscriber kinds exist: *computables* (pure
//! derivations written to a target path) and *triggers* (side-effecting
//! reactions, allowed to mutate the store or launch remote work).
//!
//! A write whose new value is the *same* (scalar-equal or pointer-equal,
//! see [`Value::same`]) as the old one does not notify. Combined with
//! identity-preserving rebuilds such as [`update_array`], this is what
//! guarantees loop-free propagation: a trigger that rewrites its own
//! dependency converges as soon as it reproduces the existing value.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, TryLockError,
};

use thiserror::Error;
use tracing::{debug, trace};

mod path;
mod value;

pub use path::Path;
pub use value::{update_array, Value};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value at path does not match the requested type: {0}")]
    Typed(#[from] serde_json::Error),
}

type Callback = Box<dyn FnMut(&Store, &[Value]) + Send>;

struct Subscription {
    scope_id: u64,
    token: ScopeToken,
    name: Option<String>,
    deps: Vec<Path>,
    callback: Mutex<Callback>,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Arc<Subscription>>,
}

struct StoreInner {
    data: Mutex<Value>,
    subs: Mutex<Registry>,
}

/// Cheaply cloneable handle to one shared state tree.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

// Lock poisoning carries no meaning for the store's plain data; recover
// the guard instead of propagating a panic from an unrelated thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Store {
    pub fn new() -> Store {
        Store {
            inner: Arc::new(StoreInner {
                data: Mutex::new(Value::empty_object()),
                subs: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Value at `path`, or `Null` when absent.
    pub fn get(&self, path: &Path) -> Value {
        read_at(&lock(&self.inner.data), path)
    }

    /// Replaces the value at `path`. Notifies unless the new value is the
    /// same (by identity) as the old one.
    pub fn set(&self, path: &Path, value: Value) {
        let changed = {
            let mut data = lock(&self.inner.data);
            apply(&mut data, path, Some(value))
        };
        if changed {
            trace!(path = %path, "store value changed");
            self.notify(path);
        }
    }

    /// Removes the value at `path`; a no-op when nothing is there.
    pub fn delete(&self, path: &Path) {
        let changed = {
            let mut data = lock(&self.inner.data);
            apply(&mut data, path, None)
        };
        if changed {
            trace!(path = %path, "store value deleted");
            self.notify(path);
        }
    }

    /// Atomic read-transform-write. `f` runs under the data lock and must
    /// not touch the store itself.
    pub fn update(&self, path: &Path, f: impl FnOnce(Value) -> Value) {
        let changed = {
            let mut data = lock(&self.inner.data);
            let current = read_at(&data, path);
            apply(&mut data, path, Some(f(current)))
        };
        if changed {
            self.notify(path);
        }
    }

    /// Boolean flip with loose coercion: absent and falsy become `true`.
    pub fn toggle(&self, path: &Path) {
        self.update(path, |v| Value::Bool(!v.truthy()));
    }

    pub fn get_typed<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        let value = self.get(path);
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value.to_typed()?))
    }

    pub fn set_typed<T: serde::Serialize>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), StoreError> {
        self.set(path, Value::from_typed(value)?);
        Ok(())
    }

    /// Runs every active subscription that depends on `changed`, in
    /// registration order. A subscription currently executing further up
    /// the call stack is skipped, so self-caused changes cannot re-enter
    /// it; such subscriptions must be idempotent over their own writes.
    fn notify(&self, changed: &Path) {
        let matched: Vec<Arc<Subscription>> = {
            let subs = lock(&self.inner.subs);
            subs.entries
                .iter()
                .filter(|s| s.token.is_active() && s.deps.iter().any(|d| d.relates(changed)))
                .cloned()
                .collect()
        };
        for sub in matched {
            if !sub.token.is_active() {
                continue;
            }
            self.run_subscription(&sub);
        }
    }

    fn run_subscription(&self, sub: &Subscription) {
        let mut callback = match sub.callback.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let args: Vec<Value> = sub.deps.iter().map(|p| self.get(p)).collect();
        (callback)(self, &args);
    }

    fn register(
        &self,
        scope_id: u64,
        token: ScopeToken,
        name: Option<String>,
        deps: Vec<Path>,
        callback: Callback,
    ) -> Arc<Subscription> {
        let mut subs = lock(&self.inner.subs);
        if let Some(name) = &name {
            // Re-registering a named trigger within a scope replaces the
            // previous handler instead of running both.
            subs.entries
                .retain(|s| !(s.scope_id == scope_id && s.name.as_deref() == Some(name)));
        }
        let sub = Arc::new(Subscription {
            scope_id,
            token,
            name,
            deps,
            callback: Mutex::new(callback),
        });
        subs.entries.push(Arc::clone(&sub));
        sub
    }

    fn unregister_scope(&self, scope_id: u64) {
        let mut subs = lock(&self.inner.subs);
        subs.entries.retain(|s| s.scope_id != scope_id);
    }
}

/// Liveness flag shared between a [`Scope`] and the async continuations it
/// spawned. A continuation left over from a torn-down scope checks
/// [`ScopeToken::is_active`] before writing to the store.
#[derive(Clone)]
pub struct ScopeToken(Arc<AtomicBool>);

impl ScopeToken {
    fn new() -> ScopeToken {
        ScopeToken(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn deactivate(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct ScopeInner {
    id: u64,
    store: Store,
    token: ScopeToken,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.token.deactivate();
        self.store.unregister_scope(self.id);
        debug!(scope = self.id, "scope deactivated");
    }
}

static NEXT_SCOPE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Owner of a set of subscriptions with one shared liveness token.
///
/// All computables and triggers registered through a scope are removed
/// when the last clone of the scope is dropped (or [`Scope::deactivate`]
/// is called); none of them fires afterwards.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new(store: &Store) -> Scope {
        Scope {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                store: store.clone(),
                token: ScopeToken::new(),
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn token(&self) -> ScopeToken {
        self.inner.token.clone()
    }

    pub fn deactivate(&self) {
        self.inner.token.deactivate();
        self.inner.store.unregister_scope(self.inner.id);
    }

    /// Declares `target` as a pure derivation of `deps`. Computed once at
    /// registration and on every subsequent change of any dependency; `f`
    /// must not perform I/O or write anywhere except through its return
    /// value.
    pub fn add_computable(
        &self,
        target: Path,
        deps: Vec<Path>,
        f: impl Fn(&[Value]) -> Value + Send + 'static,
    ) {
        let sub = self.inner.store.register(
            self.inner.id,
            self.inner.token.clone(),
            None,
            deps,
            Box::new(move |store, args| {
                store.set(&target, f(args));
            }),
        );
        self.inner.store.run_subscription(&sub);
    }

    /// Registers a side-effecting reaction to changes of any of `deps`.
    /// `name` identifies the trigger for idempotent re-registration within
    /// this scope. With `run_immediately`, `f` also runs once right away.
    pub fn add_trigger(
        &self,
        name: &str,
        deps: Vec<Path>,
        f: impl FnMut(&Store, &[Value]) + Send + 'static,
        run_immediately: bool,
    ) {
        let sub = self.inner.store.register(
            self.inner.id,
            self.inner.token.clone(),
            Some(name.to_string()),
            deps,
            Box::new(f),
        );
        debug!(trigger = name, "trigger registered");
        if run_immediately {
            self.inner.store.run_subscription(&sub);
        }
    }
}

fn read_at(root: &Value, path: &Path) -> Value {
    let mut current = root.clone();
    for segment in path.segments() {
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    current
}

/// Writes (`Some`) or deletes (`None`) at `path`, rebuilding the spine of
/// the tree with fresh nodes and sharing everything off-path. Returns
/// whether anything observable changed; a write of a same-identity value
/// or a delete of an absent node leaves the tree untouched.
fn apply(root: &mut Value, path: &Path, new: Option<Value>) -> bool {
    let segments: Vec<&str> = path.segments().collect();
    match write_at(root, &segments, new) {
        Some(next) => {
            *root = next;
            true
        }
        None => false,
    }
}

fn write_at(node: &Value, segments: &[&str], new: Option<Value>) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return match new {
            Some(value) if value.same(node) => None,
            Some(value) => Some(value),
            // Root deletion resets to an empty tree.
            None if node.is_null() => None,
            None => Some(Value::Null),
        };
    };

    if let Value::Array(items) = node {
        if let Ok(index) = head.parse::<usize>() {
            let current = items.get(index).cloned().unwrap_or(Value::Null);
            let updated = write_at(&current, rest, new)?;
            let mut next = (**items).clone();
            if index >= next.len() {
                next.resize(index + 1, Value::Null);
            }
            next[index] = updated;
            return Some(Value::Array(Arc::new(next)));
        }
    }

    match node.as_object() {
        Some(map) => {
            let current = map.get(*head).cloned();
            if rest.is_empty() && new.is_none() {
                // Deleting a leaf removes the key entirely.
                return current.map(|_| node.without_field(head));
            }
            let updated = write_at(&current.unwrap_or(Value::Null), rest, new)?;
            Some(node.with_field(*head, updated))
        }
        None => {
            // Writing below a scalar (or absent) node materializes the
            // intermediate objects; deleting there is a no-op.
            if new.is_none() {
                return None;
            }
            let updated = write_at(&Value::Null, rest, new)?;
            Some(Value::object([(*head, updated)]))
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
