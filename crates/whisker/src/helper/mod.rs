//! Helper dispatch.
//!
//! Helpers are named extensions invoked from tags whose first word matches a
//! registered name:
//!
//! ```text
//! {{#if user.admin user.active logic="or"}}...{{else}}...{{/if}}
//! {{#each items apply=decorate}}{{.}}{{/each}}
//! ```
//!
//! The words after the name become positional [`Param`]s and `key=value`
//! named params. The parser builds a [`HelperDefinition`] from them, asks
//! the helper to [`validate`](Helper::validate) it, and stores the
//! invocation in the tree. At render time the helper receives an
//! [`Options`] handle: evaluated parameters plus the scope stack and body
//! rendering primitives that core sections use.
//!
//! # Writing a Helper
//!
//! ```rust
//! use whisker::{Engine, Helper, Options, Result, SupportedKeys};
//!
//! struct Shout;
//!
//! impl Helper for Shout {
//!     fn execute(&self, options: &mut Options<'_, '_>) -> Result<()> {
//!         let text = options.param(0).map(|v| v.to_text().to_uppercase());
//!         options.append(&text.unwrap_or_default())
//!     }
//!
//!     fn supported_keys(&self) -> SupportedKeys {
//!         SupportedKeys::Closed(&[])
//!     }
//! }
//!
//! let engine = Engine::builder()
//!     .register_helper("shout", Shout)
//!     .add_template("t", "{{shout name}}!")
//!     .build()
//!     .unwrap();
//! assert_eq!(engine.render("t", &serde_json::json!({"name": "hey"})).unwrap(), "HEY!");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::context::{IterationMeta, RenderContext};
use crate::error::{Result, WhiskerError};
use crate::segment::{render_segments, HelperSegment, Param};
use crate::value::Value;

mod each;
mod matching;
mod with;

pub use each::{EachHelper, APPLY_KEY};
pub use matching::{EvaluationLogic, IfHelper, MatchingHelper, UnlessHelper, ELSE_KEY, LOGIC_KEY};
pub use with::WithHelper;

/// Named parameters a helper accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedKeys {
    /// Any key; nothing is checked.
    Any,
    /// Unknown keys are logged and ignored.
    Open(&'static [&'static str]),
    /// Unknown keys fail compilation.
    Closed(&'static [&'static str]),
}

/// A parsed helper tag.
#[derive(Debug, Clone, PartialEq)]
pub struct HelperDefinition {
    pub name: String,
    pub params: Vec<Param>,
    pub hash: BTreeMap<String, Param>,
    /// `true` for `{{#name ...}}...{{/name}}`.
    pub block: bool,
    pub line: usize,
}

/// A named template extension.
pub trait Helper: Send + Sync {
    /// Renders one invocation.
    fn execute(&self, options: &mut Options<'_, '_>) -> Result<()>;

    /// Minimum number of positional parameters.
    fn required_params(&self) -> usize {
        1
    }

    fn supported_keys(&self) -> SupportedKeys {
        SupportedKeys::Any
    }

    /// Compile-time check of a definition; errors abort compilation.
    fn validate(&self, definition: &HelperDefinition) -> Result<()> {
        let required = self.required_params();
        if definition.params.len() < required {
            return Err(WhiskerError::helper_usage(
                &definition.name,
                format!(
                    "at least {} parameter(s) required, {} given (line {})",
                    required,
                    definition.params.len(),
                    definition.line
                ),
            ));
        }
        match self.supported_keys() {
            SupportedKeys::Any => {}
            SupportedKeys::Open(keys) => {
                for key in definition.hash.keys() {
                    if !keys.contains(&key.as_str()) {
                        warn!(
                            helper = %definition.name,
                            key = %key,
                            line = definition.line,
                            "unsupported helper key ignored"
                        );
                    }
                }
            }
            SupportedKeys::Closed(keys) => {
                if let Some(key) = definition.hash.keys().find(|k| !keys.contains(&k.as_str())) {
                    return Err(WhiskerError::helper_usage(
                        &definition.name,
                        format!(
                            "unsupported key {:?} (line {}), supported: {:?}",
                            key, definition.line, keys
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Per-invocation handle passed to [`Helper::execute`].
///
/// Parameters are evaluated once, when the handle is created. Frames pushed
/// through [`push`](Options::push) are popped when the handle drops if the
/// helper has not popped them itself.
pub struct Options<'a, 'e> {
    ctx: &'a mut RenderContext<'e>,
    out: &'a mut dyn fmt::Write,
    segment: &'a HelperSegment,
    params: Vec<Value>,
    hash: BTreeMap<String, Value>,
    pushed: usize,
}

impl<'a, 'e> Options<'a, 'e> {
    pub(crate) fn new(
        ctx: &'a mut RenderContext<'e>,
        out: &'a mut dyn fmt::Write,
        segment: &'a HelperSegment,
    ) -> Self {
        let definition = &segment.definition;
        let scope: &RenderContext<'e> = ctx;
        let params = definition.params.iter().map(|p| p.evaluate(scope)).collect();
        let hash = definition
            .hash
            .iter()
            .map(|(key, p)| (key.clone(), p.evaluate(scope)))
            .collect();
        Self {
            ctx,
            out,
            segment,
            params,
            hash,
            pushed: 0,
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }

    pub fn hash(&self) -> &BTreeMap<String, Value> {
        &self.hash
    }

    pub fn hash_value(&self, key: &str) -> Option<&Value> {
        self.hash.get(key)
    }

    pub fn definition(&self) -> &HelperDefinition {
        &self.segment.definition
    }

    /// Value of the innermost scope frame.
    pub fn peek(&self) -> &Value {
        self.ctx.peek()
    }

    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.ctx.resolve(name)
    }

    pub fn push(&mut self, value: Value, meta: Option<IterationMeta>) -> Result<()> {
        self.ctx.push(value, meta)?;
        self.pushed += 1;
        Ok(())
    }

    /// Pops a frame pushed by this helper; frames it did not push are
    /// left alone.
    pub fn pop(&mut self) -> Option<Value> {
        if self.pushed == 0 {
            return None;
        }
        self.pushed -= 1;
        self.ctx.pop()
    }

    /// Renders the block body against the current stack.
    pub fn render_body(&mut self) -> Result<()> {
        render_segments(&self.segment.body, self.ctx, self.out)
    }

    pub fn has_else_body(&self) -> bool {
        self.segment.else_body.is_some()
    }

    /// Renders the `{{else}}` section, if any.
    pub fn render_else(&mut self) -> Result<()> {
        match &self.segment.else_body {
            Some(body) => render_segments(body, self.ctx, self.out),
            None => Ok(()),
        }
    }

    /// Writes raw text; it is not escaped or parsed.
    pub fn append(&mut self, text: &str) -> Result<()> {
        self.out.write_str(text)?;
        Ok(())
    }
}

impl Drop for Options<'_, '_> {
    fn drop(&mut self) {
        while self.pushed > 0 {
            self.pop();
        }
    }
}

/// Name to helper table consulted by the parser.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Arc<dyn Helper>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `if`, `unless`, `each` and `with`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    pub fn register_builtins(&mut self) {
        self.register("if", IfHelper);
        self.register("unless", UnlessHelper);
        self.register("each", EachHelper);
        self.register("with", WithHelper);
    }

    /// Registers a helper. The first registration of a name wins; later ones
    /// are logged and dropped. Returns whether the helper was added.
    pub fn register(&mut self, name: impl Into<String>, helper: impl Helper + 'static) -> bool {
        self.register_arc(name.into(), Arc::new(helper))
    }

    pub(crate) fn register_arc(&mut self, name: String, helper: Arc<dyn Helper>) -> bool {
        if self.helpers.contains_key(&name) {
            warn!(helper = %name, "helper already registered, keeping the first one");
            return false;
        }
        self.helpers.insert(name, helper);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Helper>> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.names())
            .finish()
    }
}
