//! Memoization of async producer functions on top of [`TtlCache`].
//!
//! [`TtlCache::memoize`] caches under one fixed key no matter what
//! arguments the wrapped function is called with, so a single wrapper holds a
//! single cached result. [`TtlCache::memoize_by`] is the alternative mode
//! that derives the key from the call arguments.
//!
//! Neither mode de-duplicates in-flight calls: two calls that miss before the
//! first one resolves both invoke the producer.

use std::future::Future;
use std::sync::Arc;

use crate::cache::TtlCache;

type KeyFn<A> = Box<dyn Fn(&A) -> String + Send + Sync>;

enum MemoKey<A> {
    Static(String),
    Derived(KeyFn<A>),
}

impl<A> MemoKey<A> {
    fn resolve(&self, args: &A) -> String {
        match self {
            Self::Static(key) => key.clone(),
            Self::Derived(key_fn) => key_fn(args),
        }
    }
}

/// An async function whose successful results are cached in a [`TtlCache`].
pub struct Memoized<T, A, F> {
    cache: Arc<TtlCache<T>>,
    key: MemoKey<A>,
    f: F,
}

impl<T: Clone, A, F> Memoized<T, A, F> {
    /// Returns the cached value if fresh, otherwise runs the wrapped function
    /// and caches its `Ok` result. Errors are returned as-is and never cached.
    pub async fn call<Fut, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key.resolve(&args);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let value = match (self.f)(args).await {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key = %key, "memoized call failed, nothing cached");
                return Err(err);
            }
        };
        self.cache.set(key, value.clone());
        Ok(value)
    }

    /// The cache key a call with `args` would use.
    pub fn key_for(&self, args: &A) -> String {
        self.key.resolve(args)
    }

    /// Drops the cached result for `args`, forcing the next call to recompute.
    pub fn invalidate(&self, args: &A) {
        self.cache.delete(&self.key.resolve(args));
    }

    pub fn cache(&self) -> &Arc<TtlCache<T>> {
        &self.cache
    }
}

impl<T: Clone> TtlCache<T> {
    /// Wraps `f` so its result is cached under the fixed `key`.
    ///
    /// The key does not depend on the call arguments.
    pub fn memoize<A, F, Fut, E>(
        self: &Arc<Self>,
        f: F,
        key: impl Into<String>,
    ) -> Memoized<T, A, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Memoized {
            cache: Arc::clone(self),
            key: MemoKey::Static(key.into()),
            f,
        }
    }

    /// Wraps `f` so each distinct `key_fn(&args)` gets its own cached result.
    pub fn memoize_by<A, F, Fut, E, K>(self: &Arc<Self>, f: F, key_fn: K) -> Memoized<T, A, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        K: Fn(&A) -> String + Send + Sync + 'static,
    {
        Memoized {
            cache: Arc::clone(self),
            key: MemoKey::Derived(Box::new(key_fn)),
            f,
        }
    }
}
