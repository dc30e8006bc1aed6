//! Name resolution strategies.
//!
//! A [`Resolver`] answers one question: given a candidate value (a scope
//! frame, or the value produced by the previous segment of a dotted name),
//! what does `name` refer to? The [`ResolverChain`] holds every configured
//! strategy sorted by descending priority and returns the first answer.
//!
//! # Built-in Strategies
//!
//! | Resolver | Priority | Answers |
//! |----------|----------|---------|
//! | [`ThisResolver`] | 1000 | `this` with the candidate itself |
//! | [`MapResolver`] | 200 | keys of a map candidate |
//! | [`ListIndexResolver`] | 150 | numeric indexes into a list candidate |
//! | [`ObjectResolver`] | 100 | members of a host [`Object`](crate::Object) |
//! | [`GlobalDataResolver`] | 50 | named globals, once the scope walk is exhausted |
//!
//! A strategy returning `Ok(None)` or a `Null` value has found nothing; the
//! chain moves on. A strategy returning `Err` is logged and treated the same
//! way, so one failing strategy never aborts a lookup.
//!
//! # Custom Resolvers
//!
//! Closures with the right shape implement [`Resolver`]:
//!
//! ```rust
//! use whisker::{Engine, ResolveError, Value};
//!
//! let engine = Engine::builder()
//!     .add_resolver(
//!         500,
//!         |_candidate: Option<&Value>, name: &str| -> Result<Option<Value>, ResolveError> {
//!             Ok(name.strip_prefix("env_").map(|var| Value::from(format!("${}", var))))
//!         },
//!     )
//!     .add_template("t", "{{env_HOME}}")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(engine.render("t", &()).unwrap(), "$HOME");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::ResolveError;
use crate::value::Value;

/// Priority of [`ThisResolver`].
pub const THIS_PRIORITY: i32 = 1000;
/// Priority of [`MapResolver`].
pub const MAP_PRIORITY: i32 = 200;
/// Priority of [`ListIndexResolver`].
pub const LIST_INDEX_PRIORITY: i32 = 150;
/// Priority of [`ObjectResolver`].
pub const OBJECT_PRIORITY: i32 = 100;
/// Priority of [`GlobalDataResolver`].
pub const GLOBAL_DATA_PRIORITY: i32 = 50;

/// A single name lookup strategy.
pub trait Resolver: Send + Sync {
    /// Resolves `name` against `candidate`.
    ///
    /// `candidate` is `None` for the final pass after every scope frame has
    /// been tried; only context-free strategies should answer then.
    fn resolve(&self, candidate: Option<&Value>, name: &str) -> Result<Option<Value>, ResolveError>;

    /// Name used in log messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Resolver for F
where
    F: Fn(Option<&Value>, &str) -> Result<Option<Value>, ResolveError> + Send + Sync,
{
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        self(candidate, name)
    }
}

struct Entry {
    priority: i32,
    resolver: Box<dyn Resolver>,
}

/// Resolvers in descending priority order.
///
/// Ties keep registration order.
#[derive(Default)]
pub struct ResolverChain {
    entries: Vec<Entry>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain every engine starts from.
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.add(THIS_PRIORITY, ThisResolver);
        chain.add(MAP_PRIORITY, MapResolver);
        chain.add(LIST_INDEX_PRIORITY, ListIndexResolver);
        chain.add(OBJECT_PRIORITY, ObjectResolver);
        chain
    }

    /// Inserts a resolver, keeping the chain sorted.
    pub fn add(&mut self, priority: i32, resolver: impl Resolver + 'static) {
        self.add_boxed(priority, Box::new(resolver));
    }

    pub(crate) fn add_boxed(&mut self, priority: i32, resolver: Box<dyn Resolver>) {
        // after every entry of equal or higher priority
        let at = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(at, Entry { priority, resolver });
    }

    /// Asks each strategy in turn; the first non-null answer wins.
    pub fn resolve(&self, candidate: Option<&Value>, name: &str) -> Option<Value> {
        for entry in &self.entries {
            match entry.resolver.resolve(candidate, name) {
                Ok(Some(value)) if !value.is_null() => return Some(value),
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        resolver = entry.resolver.name(),
                        name,
                        error = %err,
                        "resolver failed, treating as not found"
                    );
                }
            }
        }
        None
    }

    /// Registered priorities, highest first.
    pub fn priorities(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.priority).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.priority, e.resolver.name())),
            )
            .finish()
    }
}

/// Resolves `this` to the candidate itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThisResolver;

impl Resolver for ThisResolver {
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        Ok(match (candidate, name) {
            (Some(value), "this") => Some(value.clone()),
            _ => None,
        })
    }

    fn name(&self) -> &str {
        "this"
    }
}

/// Looks keys up in map candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapResolver;

impl Resolver for MapResolver {
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        Ok(candidate
            .and_then(Value::as_map)
            .and_then(|map| map.get(name))
            .cloned())
    }

    fn name(&self) -> &str {
        "map"
    }
}

/// Indexes into list-like candidates with a zero-based numeric name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListIndexResolver;

impl Resolver for ListIndexResolver {
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        let Some(elements) = candidate.and_then(Value::elements) else {
            return Ok(None);
        };
        let Ok(index) = name.parse::<usize>() else {
            return Ok(None);
        };
        Ok(elements.get(index).cloned())
    }

    fn name(&self) -> &str {
        "list-index"
    }
}

/// Delegates to [`Object::get`](crate::Object::get) on host objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectResolver;

impl Resolver for ObjectResolver {
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        match candidate {
            Some(Value::Object(object)) => object.get(name),
            _ => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "object"
    }
}

/// Engine-wide named values, visible from every template.
///
/// Answers only the final, candidate-less pass, so data in scope always
/// shadows a global of the same name.
#[derive(Debug, Clone, Default)]
pub struct GlobalDataResolver {
    data: BTreeMap<String, Value>,
}

impl GlobalDataResolver {
    pub fn new(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }
}

impl Resolver for GlobalDataResolver {
    fn resolve(
        &self,
        candidate: Option<&Value>,
        name: &str,
    ) -> Result<Option<Value>, ResolveError> {
        if candidate.is_some() {
            return Ok(None);
        }
        Ok(self.data.get(name).cloned())
    }

    fn name(&self) -> &str {
        "global-data"
    }
}
