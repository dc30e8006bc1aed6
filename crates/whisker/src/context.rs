//! Render-time scope stack.
//!
//! Every render call owns one [`RenderContext`]. It holds the stack of scope
//! frames (the root data at the bottom, section elements and helper-pushed
//! values above it) and the chain of partials currently being rendered.
//!
//! Frames live in a plain `Vec`: name lookup walks it from the top down, and
//! depth bounds are a length check. Push and pop must pair up within the
//! rendering of one body; [`RenderContext::scoped`] returns a guard that pops
//! on drop so the pairing survives early returns.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{Result, WhiskerError};
use crate::value::Value;

static NULL: Value = Value::Null;

/// Position of the current element within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationMeta {
    index: usize,
    size: usize,
}

impl IterationMeta {
    /// `index` is 1-based.
    pub fn new(index: usize, size: usize) -> Self {
        Self { index, size }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 0-based index.
    pub fn position(&self) -> usize {
        self.index.saturating_sub(1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_first(&self) -> bool {
        self.index == 1
    }

    pub fn is_last(&self) -> bool {
        self.index == self.size
    }

    pub fn has_next(&self) -> bool {
        self.index < self.size
    }

    pub fn is_odd(&self) -> bool {
        self.index % 2 == 1
    }

    pub fn is_even(&self) -> bool {
        self.index % 2 == 0
    }

    /// The metadata as a map, as seen through the iteration alias.
    pub fn to_value(&self) -> Value {
        let mut map = std::collections::BTreeMap::new();
        map.insert("index".to_string(), Value::from(self.index));
        map.insert("position".to_string(), Value::from(self.position()));
        map.insert("size".to_string(), Value::from(self.size));
        map.insert("isFirst".to_string(), Value::from(self.is_first()));
        map.insert("isLast".to_string(), Value::from(self.is_last()));
        map.insert("hasNext".to_string(), Value::from(self.has_next()));
        map.insert("isOdd".to_string(), Value::from(self.is_odd()));
        map.insert("isEven".to_string(), Value::from(self.is_even()));
        Value::Map(Arc::new(map))
    }
}

/// One scope: a value plus optional iteration metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub value: Value,
    pub meta: Option<IterationMeta>,
}

/// Mutable state of a single render call.
pub struct RenderContext<'e> {
    engine: &'e Engine,
    template: String,
    frames: Vec<Frame>,
    partials: Vec<String>,
}

impl<'e> RenderContext<'e> {
    /// Creates a context with `root` as the bottom frame.
    pub fn new(engine: &'e Engine, template: impl Into<String>, root: Value) -> Self {
        Self {
            engine,
            template: template.into(),
            frames: vec![Frame {
                value: root,
                meta: None,
            }],
            partials: Vec::new(),
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    pub fn config(&self) -> &'e EngineConfig {
        self.engine.config()
    }

    /// Name of the template whose segments are being rendered.
    pub fn current_template(&self) -> &str {
        self.partials.last().unwrap_or(&self.template)
    }

    /// Pushes a frame, failing once `scope_depth_limit` frames are live.
    pub fn push(&mut self, value: Value, meta: Option<IterationMeta>) -> Result<()> {
        let limit = self.config().scope_depth_limit;
        if self.frames.len() >= limit {
            return Err(WhiskerError::RecursionLimit {
                template: self.current_template().to_string(),
                limit,
            });
        }
        self.frames.push(Frame { value, meta });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.frames.pop().map(|frame| frame.value)
    }

    /// Value of the innermost frame.
    pub fn peek(&self) -> &Value {
        self.frames.last().map(|frame| &frame.value).unwrap_or(&NULL)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Pushes a frame that is popped when the guard drops.
    pub fn scoped(
        &mut self,
        value: Value,
        meta: Option<IterationMeta>,
    ) -> Result<ScopeGuard<'_, 'e>> {
        self.push(value, meta)?;
        Ok(ScopeGuard { ctx: self })
    }

    /// Resolves a possibly dotted name against the scope stack.
    ///
    /// The first segment walks the frames innermost first, then gets one
    /// candidate-less pass through the resolver chain. Later segments are
    /// resolved against the previous segment's value only. `None` means
    /// undefined.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        if name == "." {
            let top = self.peek();
            return (!top.is_null()).then(|| top.clone());
        }
        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut value = self.resolve_first(first)?;
        for segment in segments {
            value = self.engine.resolvers().resolve(Some(&value), segment)?;
        }
        Some(value)
    }

    fn resolve_first(&self, name: &str) -> Option<Value> {
        let alias = self.config().iteration_alias.as_str();
        let resolvers = self.engine.resolvers();
        for frame in self.frames.iter().rev() {
            if name == alias {
                if let Some(meta) = &frame.meta {
                    return Some(meta.to_value());
                }
            }
            if let Some(value) = resolvers.resolve(Some(&frame.value), name) {
                return Some(value);
            }
        }
        resolvers.resolve(None, name)
    }

    pub(crate) fn enter_partial(&mut self, name: &str) -> Result<()> {
        let limit = self.config().partial_recursion_limit;
        if self.partials.len() >= limit {
            return Err(WhiskerError::RecursionLimit {
                template: name.to_string(),
                limit,
            });
        }
        self.partials.push(name.to_string());
        Ok(())
    }

    pub(crate) fn leave_partial(&mut self) {
        self.partials.pop();
    }
}

/// Frame pushed by [`RenderContext::scoped`]; pops it on drop.
pub struct ScopeGuard<'c, 'e> {
    ctx: &'c mut RenderContext<'e>,
}

impl<'e> Deref for ScopeGuard<'_, 'e> {
    type Target = RenderContext<'e>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::builder()
            .add_global_data("site", "whisker")
            .build()
            .unwrap()
    }

    #[test]
    fn test_meta_flags() {
        let first = IterationMeta::new(1, 3);
        assert!(first.is_first() && !first.is_last() && first.has_next());
        assert!(first.is_odd() && !first.is_even());
        assert_eq!(first.position(), 0);

        let last = IterationMeta::new(3, 3);
        assert!(last.is_last() && !last.has_next());
    }

    #[test]
    fn test_walks_outward() {
        let engine = engine();
        let mut ctx = RenderContext::new(&engine, "t", Value::from(json!({"a": 1, "b": 2})));
        ctx.push(Value::from(json!({"a": 10})), None).unwrap();
        assert_eq!(ctx.resolve("a"), Some(Value::from(10)));
        assert_eq!(ctx.resolve("b"), Some(Value::from(2)));
        ctx.pop();
        assert_eq!(ctx.resolve("a"), Some(Value::from(1)));
    }

    #[test]
    fn test_dotted_names_do_not_walk() {
        let engine = engine();
        let mut ctx = RenderContext::new(
            &engine,
            "t",
            Value::from(json!({"a": {"b": {"c": 5}}, "x": 1})),
        );
        ctx.push(Value::from(json!({"a": {}})), None).unwrap();
        // inner "a" shadows the outer one, and "a.b" does not fall back
        assert_eq!(ctx.resolve("a.b.c"), None);
        ctx.pop();
        assert_eq!(ctx.resolve("a.b.c"), Some(Value::from(5)));
        assert_eq!(ctx.resolve("a.x.c"), None);
    }

    #[test]
    fn test_dot_and_this() {
        let engine = engine();
        let mut ctx = RenderContext::new(&engine, "t", Value::from(json!({"a": 1})));
        ctx.push(Value::from("item"), None).unwrap();
        assert_eq!(ctx.resolve("."), Some(Value::from("item")));
        assert_eq!(ctx.resolve("this"), Some(Value::from("item")));
    }

    #[test]
    fn test_iteration_alias() {
        let engine = engine();
        let mut ctx = RenderContext::new(&engine, "t", Value::Null);
        ctx.push(Value::from("x"), Some(IterationMeta::new(2, 2))).unwrap();
        assert_eq!(ctx.resolve("iter.index"), Some(Value::from(2usize)));
        assert_eq!(ctx.resolve("iter.isLast"), Some(Value::from(true)));
        // isFirst is false, which still resolves
        assert_eq!(ctx.resolve("iter.isFirst"), Some(Value::from(false)));
    }

    #[test]
    fn test_global_data_after_frames() {
        let engine = engine();
        let ctx = RenderContext::new(&engine, "t", Value::from(json!({"a": 1})));
        assert_eq!(ctx.resolve("site"), Some(Value::from("whisker")));
        let ctx = RenderContext::new(&engine, "t", Value::from(json!({"site": "local"})));
        assert_eq!(ctx.resolve("site"), Some(Value::from("local")));
    }

    #[test]
    fn test_null_root_resolves_nothing() {
        let engine = engine();
        let ctx = RenderContext::new(&engine, "t", Value::Null);
        assert_eq!(ctx.resolve("a"), None);
        assert_eq!(ctx.resolve("."), None);
    }

    #[test]
    fn test_scoped_guard_pops() {
        let engine = engine();
        let mut ctx = RenderContext::new(&engine, "t", Value::Null);
        {
            let scope = ctx.scoped(Value::from(1), None).unwrap();
            assert_eq!(scope.depth(), 2);
        }
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_scope_depth_limit() {
        let engine = Engine::builder()
            .config(EngineConfig {
                scope_depth_limit: 3,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();
        let mut ctx = RenderContext::new(&engine, "deep", Value::Null);
        ctx.push(Value::from(1), None).unwrap();
        ctx.push(Value::from(2), None).unwrap();
        let err = ctx.push(Value::from(3), None).unwrap_err();
        assert!(matches!(err, WhiskerError::RecursionLimit { limit: 3, .. }));
    }

    #[test]
    fn test_partial_limit() {
        let engine = Engine::builder()
            .config(EngineConfig {
                partial_recursion_limit: 1,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();
        let mut ctx = RenderContext::new(&engine, "t", Value::Null);
        ctx.enter_partial("p").unwrap();
        assert_eq!(ctx.current_template(), "p");
        assert!(ctx.enter_partial("p").is_err());
        ctx.leave_partial();
        assert_eq!(ctx.current_template(), "t");
    }
}
