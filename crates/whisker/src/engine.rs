//! The public rendering surface.
//!
//! An [`Engine`] bundles configuration, locators, the resolver chain, the
//! helper table and the compiled template cache. It is configured once
//! through [`EngineBuilder`] and is `Send + Sync`, so a single instance can
//! serve renders from many threads:
//!
//! ```rust
//! use serde_json::json;
//! use whisker::Engine;
//!
//! let engine = Engine::builder()
//!     .register_builtin_helpers()
//!     .add_template(
//!         "greeting",
//!         "{{#each people}}Hi {{name}}{{#unless iter.isLast}}, {{/unless}}{{/each}}",
//!     )
//!     .build()
//!     .unwrap();
//!
//! let out = engine
//!     .render("greeting", &json!({"people": [{"name": "Ada"}, {"name": "Bob"}]}))
//!     .unwrap();
//! assert_eq!(out, "Hi Ada, Hi Bob");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::error::{Result, WhiskerError};
use crate::helper::{Helper, HelperRegistry};
use crate::locator::{MapLocator, TemplateLocator};
use crate::parser::{compile, CompileOptions, CompiledTemplate};
use crate::registry::TemplateCache;
use crate::resolver::{GlobalDataResolver, Resolver, ResolverChain, GLOBAL_DATA_PRIORITY};
use crate::segment::render_segments;
use crate::value::Value;

/// Name given to templates compiled by [`Engine::render_str`].
pub const INLINE_TEMPLATE_NAME: &str = "<inline>";

/// A configured template engine.
pub struct Engine {
    config: EngineConfig,
    locators: Vec<Box<dyn TemplateLocator>>,
    resolvers: ResolverChain,
    helpers: HelperRegistry,
    cache: TemplateCache,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolvers(&self) -> &ResolverChain {
        &self.resolvers
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Returns the compiled template for `name`.
    ///
    /// # Errors
    ///
    /// [`WhiskerError::TemplateNotFound`] when no locator knows the name,
    /// plus any compilation or locator error.
    pub fn get_template(&self, name: &str) -> Result<Arc<CompiledTemplate>> {
        self.find_template(name)?
            .ok_or_else(|| WhiskerError::TemplateNotFound(name.to_string()))
    }

    /// Like [`get_template`](Self::get_template), with a missing template
    /// reported as `None`.
    pub fn find_template(&self, name: &str) -> Result<Option<Arc<CompiledTemplate>>> {
        if self.config.cache_enabled {
            self.cache.get_or_compile(name, || self.load(name))
        } else {
            Ok(self.load(name)?.map(Arc::new))
        }
    }

    fn load(&self, name: &str) -> Result<Option<CompiledTemplate>> {
        for locator in &self.locators {
            if let Some(source) = locator.locate(name)? {
                debug!(template = name, "compiling template");
                return self.compile_str(name, &source).map(Some);
            }
        }
        Ok(None)
    }

    /// Compiles `source` with this engine's settings; the result is not
    /// cached.
    pub fn compile_str(&self, name: &str, source: &str) -> Result<CompiledTemplate> {
        compile(name, source, &CompileOptions::from_config(&self.config, &self.helpers))
    }

    /// Renders the named template against serializable `data`.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        self.render_value(name, Value::from_serialize(data)?)
    }

    /// Renders the named template into `out`.
    pub fn render_to<T: Serialize + ?Sized>(
        &self,
        name: &str,
        data: &T,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        let template = self.get_template(name)?;
        self.render_template(&template, Value::from_serialize(data)?, out)
    }

    /// Renders the named template against a prepared [`Value`].
    pub fn render_value(&self, name: &str, data: Value) -> Result<String> {
        let template = self.get_template(name)?;
        let mut out = String::new();
        self.render_template(&template, data, &mut out)?;
        Ok(out)
    }

    /// Renders an already compiled template.
    pub fn render_template(
        &self,
        template: &CompiledTemplate,
        data: Value,
        out: &mut dyn fmt::Write,
    ) -> Result<()> {
        let mut ctx = RenderContext::new(self, template.name(), data);
        render_segments(template.segments(), &mut ctx, out)
    }

    /// Compiles and renders `source` without caching it.
    pub fn render_str<T: Serialize + ?Sized>(&self, source: &str, data: &T) -> Result<String> {
        let template = self.compile_str(INLINE_TEMPLATE_NAME, source)?;
        let mut out = String::new();
        self.render_template(&template, Value::from_serialize(data)?, &mut out)?;
        Ok(out)
    }

    /// Compiles every template the locators report; returns how many.
    pub fn precompile_all(&self) -> Result<usize> {
        let mut names = BTreeSet::new();
        for locator in &self.locators {
            names.extend(locator.all_identifiers()?);
        }
        for name in &names {
            self.get_template(name)?;
        }
        debug!(count = names.len(), "precompiled templates");
        Ok(names.len())
    }

    /// Drops cached templates whose name matches `predicate`.
    pub fn invalidate_templates(&self, predicate: impl Fn(&str) -> bool) -> usize {
        self.cache.invalidate(predicate)
    }

    /// Drops every cached template.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Makes every locator forget what it indexed and drops the cache, so
    /// templates added to or changed in a locator's source are picked up.
    pub fn refresh(&self) {
        for locator in &self.locators {
            locator.refresh();
        }
        self.cache.clear();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("locators", &self.locators.len())
            .field("resolvers", &self.resolvers)
            .field("helpers", &self.helpers)
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Configures an [`Engine`].
///
/// Templates added with [`add_template`](Self::add_template) are served
/// before any locator's.
pub struct EngineBuilder {
    config: EngineConfig,
    locators: Vec<Box<dyn TemplateLocator>>,
    templates: MapLocator,
    resolvers: Vec<(i32, Box<dyn Resolver>)>,
    globals: GlobalDataResolver,
    has_globals: bool,
    helpers: HelperRegistry,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            locators: Vec::new(),
            templates: MapLocator::new().with_priority(i32::MAX),
            resolvers: Vec::new(),
            globals: GlobalDataResolver::default(),
            has_globals: false,
            helpers: HelperRegistry::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_locator(mut self, locator: impl TemplateLocator + 'static) -> Self {
        self.locators.push(Box::new(locator));
        self
    }

    /// Adds an in-memory template.
    pub fn add_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name, source);
        self
    }

    /// Adds a resolver next to the built-in ones.
    pub fn add_resolver(mut self, priority: i32, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push((priority, Box::new(resolver)));
        self
    }

    /// Makes `value` visible as `name` from every template, unless data in
    /// scope has the same name.
    pub fn add_global_data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name, value);
        self.has_globals = true;
        self
    }

    /// Registers a helper; the first registration of a name wins.
    pub fn register_helper(
        mut self,
        name: impl Into<String>,
        helper: impl Helper + 'static,
    ) -> Self {
        self.helpers.register(name, helper);
        self
    }

    /// Registers `if`, `unless`, `each` and `with`.
    pub fn register_builtin_helpers(mut self) -> Self {
        self.helpers.register_builtins();
        self
    }

    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let mut resolvers = ResolverChain::with_defaults();
        for (priority, resolver) in self.resolvers {
            resolvers.add_boxed(priority, resolver);
        }
        if self.has_globals {
            resolvers.add(GLOBAL_DATA_PRIORITY, self.globals);
        }

        let mut locators = self.locators;
        if !self.templates.is_empty() {
            locators.push(Box::new(self.templates));
        }
        locators.sort_by_key(|locator| std::cmp::Reverse(locator.priority()));

        let engine = Engine {
            cache: TemplateCache::new(self.config.cache_expiration()),
            config: self.config,
            locators,
            resolvers,
            helpers: self.helpers,
        };
        if engine.config.precompile_all {
            engine.precompile_all()?;
        }
        Ok(engine)
    }
}
