//! Compiled template cache.
//!
//! [`TemplateCache`] maps template names to compiled trees shared through
//! `Arc`. Compilation runs outside the lock, so two threads missing the same
//! name may both compile it; the first one to publish wins and the other
//! adopts that entry. Entries are only ever replaced whole, so a reader
//! never sees a partially built template.
//!
//! With an expiration set, entries older than the timeout count as missing
//! and are recompiled on the next request.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::parser::CompiledTemplate;

/// Name to compiled template map, safe for concurrent use.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
    expiration: Option<Duration>,
}

impl TemplateCache {
    pub fn new(expiration: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiration,
        }
    }

    /// Returns the cached template unless it is missing or expired.
    pub fn get(&self, name: &str) -> Option<Arc<CompiledTemplate>> {
        self.read()
            .get(name)
            .filter(|template| !self.is_expired(template))
            .cloned()
    }

    /// Returns the cached template, compiling and publishing it on a miss.
    ///
    /// `compile` returns `Ok(None)` when no source exists for the name;
    /// nothing is cached then, and neither is a failed compilation.
    pub fn get_or_compile<F>(&self, name: &str, compile: F) -> Result<Option<Arc<CompiledTemplate>>>
    where
        F: FnOnce() -> Result<Option<CompiledTemplate>>,
    {
        if let Some(template) = self.get(name) {
            return Ok(Some(template));
        }
        debug!(template = name, "template cache miss, compiling");
        let Some(compiled) = compile()? else {
            return Ok(None);
        };
        let compiled = Arc::new(compiled);

        let mut entries = self.write();
        match entries.get(name) {
            Some(existing) if !self.is_expired(existing) => Ok(Some(Arc::clone(existing))),
            _ => {
                entries.insert(name.to_string(), Arc::clone(&compiled));
                Ok(Some(compiled))
            }
        }
    }

    /// Evicts every entry whose name matches; returns how many went.
    pub fn invalidate(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|name, _| !predicate(name));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "invalidated cached templates");
        }
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn is_expired(&self, template: &CompiledTemplate) -> bool {
        self.expiration
            .is_some_and(|expiration| template.age() >= expiration)
    }

    // Every update is a single insert or removal; poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CompiledTemplate>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CompiledTemplate>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
