//! Template tokenizer.
//!
//! The [`Lexer`] splits template source into literal runs and
//! delimiter-bounded tags:
//!
//! ```text
//! Hello {{name}}!\n{{#items}}
//! = [Literal("Hello "), Tag(Variable, "name"), Literal("!\n"), Tag(Section, "items")]
//! ```
//!
//! Literal runs are cut after every newline so the parser can apply
//! standalone-line rules one source line at a time.
//!
//! The delimiter pair is lexer state: a `{{=<% %>=}}` tag switches it for the
//! rest of the template, which is why the token stream can only be restarted
//! by lexing the source again.

use crate::error::{Result, WhiskerError};

/// An opening/closing tag delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Tag flavour, selected by the sigil following the opening delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{name}}`
    Variable,
    /// `{{{name}}}` or `{{&name}}`
    Unescaped,
    /// `{{#name}}`
    Section,
    /// `{{^name}}`
    InvertedSection,
    /// `{{/name}}`
    Close,
    /// `{{>name}}`
    Partial,
    /// `{{!text}}`
    Comment,
}

impl TagKind {
    fn from_sigil(sigil: u8) -> Option<Self> {
        match sigil {
            b'#' => Some(Self::Section),
            b'^' => Some(Self::InvertedSection),
            b'/' => Some(Self::Close),
            b'>' => Some(Self::Partial),
            b'!' => Some(Self::Comment),
            b'&' | b'{' => Some(Self::Unescaped),
            _ => None,
        }
    }

    /// Block tags may stand alone on a line and get that line trimmed.
    pub fn is_block(self) -> bool {
        !matches!(self, Self::Variable | Self::Unescaped)
    }
}

/// A lexical unit of template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal text; at most one line, including its trailing newline.
    Literal { text: &'a str, line: usize },
    /// A tag with its trimmed content.
    Tag {
        kind: TagKind,
        content: &'a str,
        line: usize,
    },
    /// `{{=open close=}}`; already applied to the lexer state.
    DelimiterChange {
        open: &'a str,
        close: &'a str,
        line: usize,
    },
}

impl Token<'_> {
    /// 1-based source line the token starts on.
    pub fn line(&self) -> usize {
        match self {
            Token::Literal { line, .. }
            | Token::Tag { line, .. }
            | Token::DelimiterChange { line, .. } => *line,
        }
    }
}

/// Lazy tokenizer over one template's source.
pub struct Lexer<'a> {
    template: &'a str,
    source: &'a str,
    offset: usize,
    line: usize,
    delimiters: Delimiters,
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer; `template` names the source in error messages.
    pub fn new(template: &'a str, source: &'a str, delimiters: Delimiters) -> Self {
        Self {
            template,
            source,
            offset: 0,
            line: 1,
            delimiters,
            done: false,
        }
    }

    /// Delimiters currently in effect.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    fn literal(&mut self, end: usize) -> Token<'a> {
        let source = self.source;
        let run = &source[self.offset..self.offset + end];
        let len = run.find('\n').map(|i| i + 1).unwrap_or(run.len());
        let text = &run[..len];
        let token = Token::Literal {
            text,
            line: self.line,
        };
        self.offset += len;
        if text.ends_with('\n') {
            self.line += 1;
        }
        token
    }

    fn tag(&mut self) -> Result<Token<'a>> {
        let source = self.source;
        let line = self.line;
        let close = self.delimiters.close.clone();
        let start = self.offset + self.delimiters.open.len();
        let sigil = source.as_bytes().get(start).copied();

        let (kind, terminator) = match sigil {
            Some(b'=') => (None, format!("={}", close)),
            Some(b'{') => (Some(TagKind::Unescaped), format!("}}{}", close)),
            Some(c) => (Some(TagKind::from_sigil(c).unwrap_or(TagKind::Variable)), close),
            None => (Some(TagKind::Variable), close),
        };
        let content_start = match (sigil, kind) {
            (Some(b'='), _) => start + 1,
            (_, Some(TagKind::Variable)) => start,
            _ => start + 1,
        };

        let Some(len) = source[content_start..].find(terminator.as_str()) else {
            return Err(WhiskerError::malformed(
                self.template,
                line,
                format!("unterminated tag, expected {:?}", terminator),
            ));
        };
        let raw = &source[content_start..content_start + len];
        let end = content_start + len + terminator.len();
        self.line += source[self.offset..end].matches('\n').count();
        self.offset = end;
        let content = raw.trim();

        let Some(kind) = kind else {
            return self.delimiter_change(content, line);
        };
        if content.is_empty() && kind != TagKind::Comment {
            return Err(WhiskerError::malformed(self.template, line, "empty tag"));
        }
        Ok(Token::Tag {
            kind,
            content,
            line,
        })
    }

    fn delimiter_change(&mut self, content: &'a str, line: usize) -> Result<Token<'a>> {
        let parts: Vec<&'a str> = content.split_whitespace().collect();
        match *parts.as_slice() {
            [open, close] if !open.contains('=') && !close.contains('=') => {
                self.delimiters = Delimiters::new(open, close);
                Ok(Token::DelimiterChange {
                    open,
                    close,
                    line,
                })
            }
            _ => Err(WhiskerError::malformed(
                self.template,
                line,
                format!("invalid delimiter change {:?}", content),
            )),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.source.len() {
            return None;
        }
        let source = self.source;
        let rest = &source[self.offset..];
        match rest.find(self.delimiters.open.as_str()) {
            Some(0) => {
                let tag = self.tag();
                // no resynchronisation after a bad tag
                self.done = tag.is_err();
                Some(tag)
            }
            Some(n) => Some(Ok(self.literal(n))),
            None => Some(Ok(self.literal(rest.len()))),
        }
    }
}

/// Lexes a whole template eagerly.
pub fn tokenize<'a>(
    template: &'a str,
    source: &'a str,
    delimiters: Delimiters,
) -> Result<Vec<Token<'a>>> {
    Lexer::new(template, source, delimiters).collect()
}
