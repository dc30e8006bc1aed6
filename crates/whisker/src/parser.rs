//! Template compiler.
//!
//! [`compile`] turns template source into a [`CompiledTemplate`] in three
//! passes:
//!
//! 1. Lexing (see [`crate::lexer`]).
//! 2. Standalone trimming: a source line holding only block tags and
//!    whitespace loses that whitespace and its newline, so
//!
//!    ```text
//!    A
//!    {{#s}}
//!    B
//!    {{/s}}
//!    C
//!    ```
//!
//!    renders `A\nB\nC` rather than leaving blank lines behind. A
//!    standalone partial keeps its indentation on the segment, to be
//!    re-applied to every line the partial renders.
//! 3. Tree building: sections and helper blocks are matched with their
//!    closing tags and tags naming a registered helper become helper
//!    invocations. A registered helper name always takes precedence over a
//!    data key of the same name; the key stays reachable as `this.<name>`.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::config::EngineConfig;
use crate::error::{Result, WhiskerError};
use crate::helper::{Helper, HelperDefinition, HelperRegistry};
use crate::lexer::{tokenize, Delimiters, TagKind, Token};
use crate::segment::{HelperSegment, Param, Segment};

/// Inputs to [`compile`] besides the source itself.
#[derive(Debug, Clone)]
pub struct CompileOptions<'a> {
    pub delimiters: Delimiters,
    pub helpers: &'a HelperRegistry,
    pub remove_standalone_lines: bool,
}

impl<'a> CompileOptions<'a> {
    pub fn new(helpers: &'a HelperRegistry) -> Self {
        Self {
            delimiters: Delimiters::default(),
            helpers,
            remove_standalone_lines: true,
        }
    }

    pub fn from_config(config: &EngineConfig, helpers: &'a HelperRegistry) -> Self {
        Self {
            delimiters: config.delimiters(),
            helpers,
            remove_standalone_lines: config.remove_standalone_lines,
        }
    }
}

/// An immutable compiled template.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    segments: Vec<Segment>,
    created_at: SystemTime,
    compiled_at: Instant,
}

impl CompiledTemplate {
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            name: name.into(),
            segments,
            created_at: SystemTime::now(),
            compiled_at: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Wall-clock compilation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time since compilation.
    pub fn age(&self) -> Duration {
        self.compiled_at.elapsed()
    }
}

/// Compiles `source`; `name` identifies it in errors and in the result.
///
/// # Errors
///
/// [`WhiskerError::MalformedTag`], [`WhiskerError::UnmatchedTag`] and
/// [`WhiskerError::UnclosedTag`] for source defects, and
/// [`WhiskerError::InvalidHelperUsage`] when a helper rejects its
/// definition.
pub fn compile(
    name: &str,
    source: &str,
    options: &CompileOptions<'_>,
) -> Result<CompiledTemplate> {
    let tokens = tokenize(name, source, options.delimiters.clone())?;
    let items = if options.remove_standalone_lines {
        strip_standalone(tokens, options.helpers)
    } else {
        tokens
            .into_iter()
            .map(|token| Item { token, indent: "" })
            .collect()
    };
    let segments = TreeBuilder::new(name, options.helpers).build(items)?;
    Ok(CompiledTemplate::new(name, segments))
}

struct Item<'a> {
    token: Token<'a>,
    indent: &'a str,
}

fn first_word(content: &str) -> &str {
    content.split_whitespace().next().unwrap_or("")
}

fn strip_standalone<'a>(tokens: Vec<Token<'a>>, helpers: &HelperRegistry) -> Vec<Item<'a>> {
    let mut items = Vec::with_capacity(tokens.len());
    // open blocks, innermost last; true for helper blocks
    let mut blocks = Vec::new();
    let mut line = Vec::new();
    for token in tokens {
        let ends_line = matches!(token, Token::Literal { text, .. } if text.ends_with('\n'));
        line.push(token);
        if ends_line {
            flush_line(&mut line, &mut blocks, helpers, &mut items);
        }
    }
    flush_line(&mut line, &mut blocks, helpers, &mut items);
    items
}

fn flush_line<'a>(
    line: &mut Vec<Token<'a>>,
    blocks: &mut Vec<bool>,
    helpers: &HelperRegistry,
    items: &mut Vec<Item<'a>>,
) {
    if !is_standalone(line, blocks, helpers) {
        items.extend(line.drain(..).map(|token| Item { token, indent: "" }));
        return;
    }
    let indent = match line.first() {
        Some(Token::Literal { text, .. }) => *text,
        _ => "",
    };
    for token in line.drain(..) {
        match token {
            Token::Literal { .. } => {}
            Token::Tag {
                kind: TagKind::Partial,
                ..
            } => items.push(Item { token, indent }),
            token => items.push(Item { token, indent: "" }),
        }
    }
}

/// Whether a line holds only whitespace and at least one block tag, with
/// `{{else}}` inside a helper block counting as one.
fn is_standalone(line: &[Token<'_>], blocks: &mut Vec<bool>, helpers: &HelperRegistry) -> bool {
    let mut standalone = true;
    let mut has_block = false;
    for token in line {
        match token {
            Token::Literal { text, .. } => {
                if !text.chars().all(char::is_whitespace) {
                    standalone = false;
                }
            }
            Token::DelimiterChange { .. } => has_block = true,
            Token::Tag { kind, content, .. } => {
                match kind {
                    TagKind::Section => blocks.push(helpers.contains(first_word(content))),
                    TagKind::InvertedSection => blocks.push(false),
                    TagKind::Close => {
                        blocks.pop();
                    }
                    _ => {}
                }
                if kind.is_block() || is_else(*kind, content, blocks.last() == Some(&true)) {
                    has_block = true;
                } else {
                    standalone = false;
                }
            }
        }
    }
    standalone && has_block
}

fn is_else(kind: TagKind, content: &str, in_helper_block: bool) -> bool {
    in_helper_block && kind == TagKind::Variable && content == "else"
}

enum BlockKind {
    Section {
        inverted: bool,
    },
    Helper {
        helper: Arc<dyn Helper>,
        definition: HelperDefinition,
    },
}

struct OpenBlock {
    kind: BlockKind,
    name: String,
    line: usize,
    body: Vec<Segment>,
    else_body: Option<Vec<Segment>>,
}

struct TreeBuilder<'o> {
    template: &'o str,
    helpers: &'o HelperRegistry,
    root: Vec<Segment>,
    open: Vec<OpenBlock>,
}

impl<'o> TreeBuilder<'o> {
    fn new(template: &'o str, helpers: &'o HelperRegistry) -> Self {
        Self {
            template,
            helpers,
            root: Vec::new(),
            open: Vec::new(),
        }
    }

    fn build(mut self, items: Vec<Item<'_>>) -> Result<Vec<Segment>> {
        for Item { token, indent } in items {
            match token {
                Token::Literal { text, .. } => self.push_text(text),
                Token::DelimiterChange { .. } => {}
                Token::Tag {
                    kind,
                    content,
                    line,
                } => self.tag(kind, content, indent, line)?,
            }
        }
        if let Some(block) = self.open.pop() {
            return Err(WhiskerError::UnclosedTag {
                template: self.template.to_string(),
                name: block.name,
                line: block.line,
            });
        }
        Ok(self.root)
    }

    fn tag(&mut self, kind: TagKind, content: &str, indent: &str, line: usize) -> Result<()> {
        match kind {
            TagKind::Comment => self.push(Segment::Comment),
            TagKind::Partial => self.push(Segment::Partial {
                name: content.to_string(),
                indent: indent.to_string(),
                line,
            }),
            TagKind::Variable if is_else(kind, content, self.in_helper_block()) => {
                self.open_else(line)?
            }
            TagKind::Variable | TagKind::Unescaped => match self.helper(content, false, line)? {
                Some((helper, definition)) => self.push(Segment::Helper(HelperSegment {
                    helper,
                    definition,
                    body: Vec::new(),
                    else_body: None,
                })),
                None => self.push(Segment::Variable {
                    name: content.to_string(),
                    escape: kind == TagKind::Variable,
                    line,
                }),
            },
            TagKind::Section => {
                let (kind, name) = match self.helper(content, true, line)? {
                    Some((helper, definition)) => {
                        let name = definition.name.clone();
                        (BlockKind::Helper { helper, definition }, name)
                    }
                    None => (BlockKind::Section { inverted: false }, content.to_string()),
                };
                self.open_block(kind, name, line);
            }
            TagKind::InvertedSection => {
                self.open_block(BlockKind::Section { inverted: true }, content.to_string(), line)
            }
            TagKind::Close => self.close(content, line)?,
        }
        Ok(())
    }

    fn helper(
        &self,
        content: &str,
        block: bool,
        line: usize,
    ) -> Result<Option<(Arc<dyn Helper>, HelperDefinition)>> {
        let Some(helper) = self.helpers.get(first_word(content)) else {
            return Ok(None);
        };
        let words = split_words(content)
            .map_err(|reason| WhiskerError::malformed(self.template, line, reason))?;
        let Some((name, args)) = words.split_first() else {
            return Ok(None);
        };

        let mut params = Vec::new();
        let mut hash = std::collections::BTreeMap::new();
        for word in args {
            match split_named(word) {
                Some((key, "")) => {
                    return Err(WhiskerError::malformed(
                        self.template,
                        line,
                        format!("missing value for helper key {:?}", key),
                    ))
                }
                Some((key, value)) => {
                    hash.insert(key.to_string(), Param::parse(value));
                }
                None => params.push(Param::parse(word)),
            }
        }
        let definition = HelperDefinition {
            name: name.to_string(),
            params,
            hash,
            block,
            line,
        };
        helper.validate(&definition)?;
        Ok(Some((Arc::clone(helper), definition)))
    }

    fn in_helper_block(&self) -> bool {
        matches!(
            self.open.last(),
            Some(OpenBlock {
                kind: BlockKind::Helper { .. },
                ..
            })
        )
    }

    fn open_block(&mut self, kind: BlockKind, name: String, line: usize) {
        self.open.push(OpenBlock {
            kind,
            name,
            line,
            body: Vec::new(),
            else_body: None,
        });
    }

    fn open_else(&mut self, line: usize) -> Result<()> {
        let template = self.template;
        match self.open.last_mut() {
            Some(block) if block.else_body.is_none() => {
                block.else_body = Some(Vec::new());
                Ok(())
            }
            _ => Err(WhiskerError::malformed(template, line, "duplicate {{else}} in helper block")),
        }
    }

    fn close(&mut self, name: &str, line: usize) -> Result<()> {
        let Some(block) = self.open.pop() else {
            return Err(WhiskerError::UnmatchedTag {
                template: self.template.to_string(),
                line,
                expected: "(none)".to_string(),
                found: name.to_string(),
            });
        };
        if block.name != name {
            return Err(WhiskerError::UnmatchedTag {
                template: self.template.to_string(),
                line,
                expected: block.name,
                found: name.to_string(),
            });
        }
        let segment = match block.kind {
            BlockKind::Section { inverted } => Segment::Section {
                name: block.name,
                inverted,
                body: block.body,
                line: block.line,
            },
            BlockKind::Helper { helper, definition } => Segment::Helper(HelperSegment {
                helper,
                definition,
                body: block.body,
                else_body: block.else_body,
            }),
        };
        self.push(segment);
        Ok(())
    }

    fn current(&mut self) -> &mut Vec<Segment> {
        match self.open.last_mut() {
            Some(block) => match &mut block.else_body {
                Some(else_body) => else_body,
                None => &mut block.body,
            },
            None => &mut self.root,
        }
    }

    fn push(&mut self, segment: Segment) {
        self.current().push(segment);
    }

    fn push_text(&mut self, text: &str) {
        let current = self.current();
        match current.last_mut() {
            Some(Segment::Text(last)) => last.push_str(text),
            _ => current.push(Segment::Text(text.to_string())),
        }
    }
}

/// Splits helper tag content on whitespace outside of quotes.
fn split_words(content: &str) -> std::result::Result<Vec<&str>, String> {
    let mut words = Vec::new();
    let mut start = None;
    let mut quote = None;
    for (i, c) in content.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            None if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    words.push(&content[s..i]);
                }
            }
            None => {
                start.get_or_insert(i);
            }
        }
    }
    if quote.is_some() {
        return Err(format!("unterminated string literal in {:?}", content));
    }
    if let Some(s) = start {
        words.push(&content[s..]);
    }
    Ok(words)
}

/// Splits `key=value`; quoted words are never named params.
fn split_named(word: &str) -> Option<(&str, &str)> {
    if word.starts_with(['"', '\'']) {
        return None;
    }
    let (key, value) = word.split_once('=')?;
    if key.is_empty() || key.contains(['"', '\'']) {
        return None;
    }
    Some((key, value))
}
