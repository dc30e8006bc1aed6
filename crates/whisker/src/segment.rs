//! Compiled template tree and its renderer.
//!
//! A compiled template is a `Vec<Segment>`. Sections and helper blocks own
//! their bodies, so the tree is finished once the parser returns and is only
//! read afterwards; one tree serves any number of concurrent renders.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::{IterationMeta, RenderContext};
use crate::error::Result;
use crate::escape::escape_html;
use crate::helper::{Helper, HelperDefinition, Options};
use crate::value::Value;

/// A helper parameter as written in the tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A literal: quoted string, number, `true`, `false` or `null`.
    Literal(Value),
    /// A (possibly dotted) name resolved at render time.
    Name(String),
}

impl Param {
    /// Classifies one word of a helper tag.
    ///
    /// Quotes must already be balanced; the parser checks that.
    pub fn parse(word: &str) -> Param {
        let bytes = word.as_bytes();
        if bytes.len() >= 2 {
            let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
            if (first == b'"' || first == b'\'') && first == last {
                return Param::Literal(Value::from(&word[1..word.len() - 1]));
            }
        }
        match word {
            "true" => return Param::Literal(Value::Bool(true)),
            "false" => return Param::Literal(Value::Bool(false)),
            "null" => return Param::Literal(Value::Null),
            _ => {}
        }
        if looks_numeric(word) {
            if let Ok(n) = word.parse::<i64>() {
                return Param::Literal(Value::from(n));
            }
            if let Ok(n) = word.parse::<f64>() {
                return Param::Literal(Value::from(n));
            }
        }
        Param::Name(word.to_string())
    }

    /// Evaluates against the current scope; undefined names become `Null`.
    pub fn evaluate(&self, ctx: &RenderContext<'_>) -> Value {
        match self {
            Param::Literal(value) => value.clone(),
            Param::Name(name) => ctx.resolve(name).unwrap_or_default(),
        }
    }
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

/// A node of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal output.
    Text(String),
    /// `{{name}}` (escaped) or `{{{name}}}` / `{{&name}}`.
    Variable {
        name: String,
        escape: bool,
        line: usize,
    },
    /// `{{#name}}...{{/name}}` or `{{^name}}...{{/name}}`.
    Section {
        name: String,
        inverted: bool,
        body: Vec<Segment>,
        line: usize,
    },
    /// `{{>name}}`; `indent` prefixes every rendered line.
    Partial {
        name: String,
        indent: String,
        line: usize,
    },
    /// A registered helper, in tag or block form.
    Helper(HelperSegment),
    /// `{{! ... }}`; renders nothing.
    Comment,
}

/// A compiled helper invocation.
#[derive(Clone)]
pub struct HelperSegment {
    pub helper: Arc<dyn Helper>,
    pub definition: HelperDefinition,
    pub body: Vec<Segment>,
    /// Segments after `{{else}}`, when the block has one.
    pub else_body: Option<Vec<Segment>>,
}

impl fmt::Debug for HelperSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperSegment")
            .field("definition", &self.definition)
            .field("body", &self.body)
            .field("else_body", &self.else_body)
            .finish_non_exhaustive()
    }
}

impl PartialEq for HelperSegment {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.helper), Arc::as_ptr(&other.helper))
            && self.definition == other.definition
            && self.body == other.body
            && self.else_body == other.else_body
    }
}

/// Renders `segments` into `out`.
pub fn render_segments(
    segments: &[Segment],
    ctx: &mut RenderContext<'_>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.write_str(text)?,
            Segment::Variable { name, escape, .. } => render_variable(name, *escape, ctx, out)?,
            Segment::Section {
                name,
                inverted: false,
                body,
                ..
            } => render_section(name, body, ctx, out)?,
            Segment::Section {
                name,
                inverted: true,
                body,
                ..
            } => {
                if ctx.resolve(name).map_or(true, |value| value.is_falsy()) {
                    render_segments(body, ctx, out)?;
                }
            }
            Segment::Partial { name, indent, .. } => render_partial(name, indent, ctx, out)?,
            Segment::Helper(helper) => {
                let mut options = Options::new(ctx, out, helper);
                helper.helper.execute(&mut options)?;
            }
            Segment::Comment => {}
        }
    }
    Ok(())
}

fn render_variable(
    name: &str,
    escape: bool,
    ctx: &RenderContext<'_>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    let value = match ctx.resolve(name) {
        None | Some(Value::Bool(false)) => return Ok(()),
        Some(value) => value,
    };
    let text = value.to_text();
    if escape && !ctx.config().skip_value_escaping {
        escape_html(&text, out)?;
    } else {
        out.write_str(&text)?;
    }
    Ok(())
}

fn render_section(
    name: &str,
    body: &[Segment],
    ctx: &mut RenderContext<'_>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    let Some(value) = ctx.resolve(name) else {
        return Ok(());
    };
    if let Some(elements) = value.elements() {
        let size = elements.len();
        for (i, element) in elements.iter().enumerate() {
            let meta = IterationMeta::new(i + 1, size);
            let mut scope = ctx.scoped(element.clone(), Some(meta))?;
            render_segments(body, &mut scope, out)?;
        }
    } else if value.is_truthy() {
        let mut scope = ctx.scoped(value, None)?;
        render_segments(body, &mut scope, out)?;
    }
    Ok(())
}

fn render_partial(
    name: &str,
    indent: &str,
    ctx: &mut RenderContext<'_>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    let Some(template) = ctx.engine().find_template(name)? else {
        debug!(partial = name, "partial not found, rendering nothing");
        return Ok(());
    };
    ctx.enter_partial(name)?;
    let result = if indent.is_empty() {
        render_segments(template.segments(), ctx, out)
    } else {
        let mut buffer = String::new();
        render_segments(template.segments(), ctx, &mut buffer)
            .and_then(|()| write_indented(&buffer, indent, out))
    };
    ctx.leave_partial();
    result
}

fn write_indented(text: &str, indent: &str, out: &mut dyn fmt::Write) -> Result<()> {
    for line in text.split_inclusive('\n') {
        out.write_str(indent)?;
        out.write_str(line)?;
    }
    Ok(())
}
