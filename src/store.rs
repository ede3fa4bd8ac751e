//! In-memory quote repository keyed by quote id.

use crate::model::{now_iso8601, Quote};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
pub struct QuoteStore {
    inner: Arc<RwLock<HashMap<String, Quote>>>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a fresh quote, returning it.
    pub fn create(&self) -> Quote {
        let quote = Quote::new();
        let mut store = self.inner.write().unwrap();
        store.insert(quote.id.clone(), quote.clone());
        tracing::debug!("QuoteStore: created '{}'", quote.id);
        quote
    }

    pub fn get(&self, id: &str) -> Option<Quote> {
        let store = self.inner.read().unwrap();
        store.get(id).cloned()
    }

    /// All stored quotes, newest first.
    pub fn list(&self) -> Vec<Quote> {
        let store = self.inner.read().unwrap();
        let mut quotes: Vec<Quote> = store.values().cloned().collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        quotes
    }

    /// Replace a stored quote, stamping `updated_at`. Returns the stored
    /// version, or `None` when the id is unknown.
    pub fn update(&self, id: &str, mut quote: Quote) -> Option<Quote> {
        let mut store = self.inner.write().unwrap();
        if !store.contains_key(id) {
            return None;
        }
        quote.id = id.to_string();
        quote.updated_at = now_iso8601();
        store.insert(id.to_string(), quote.clone());
        Some(quote)
    }

    /// Apply a mutation to a stored quote in place.
    pub fn modify(&self, id: &str, f: impl FnOnce(&mut Quote)) -> Option<Quote> {
        let mut store = self.inner.write().unwrap();
        let quote = store.get_mut(id)?;
        f(quote);
        quote.updated_at = now_iso8601();
        Some(quote.clone())
    }

    /// Apply a fallible mutation under the write lock. Mutations that depend
    /// on the quote's current shape (a group id, an item index) must resolve
    /// it inside the closure — a snapshot taken before the lock can be stale
    /// by the time the closure runs. `updated_at` is stamped only on success.
    pub fn try_modify<T, E>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Quote) -> Result<T, E>,
    ) -> Option<Result<(T, Quote), E>> {
        let mut store = self.inner.write().unwrap();
        let quote = store.get_mut(id)?;
        match f(quote) {
            Ok(value) => {
                quote.updated_at = now_iso8601();
                Some(Ok((value, quote.clone())))
            }
            Err(e) => Some(Err(e)),
        }
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut store = self.inner.write().unwrap();
        store.remove(id).is_some()
    }
}
