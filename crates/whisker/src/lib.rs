//! # Whisker - Logic-less Templates with Helpers
//!
//! `whisker` compiles Mustache-style templates once into an immutable tree
//! and renders them any number of times, from any number of threads, against
//! arbitrary nested data.
//!
//! ## Core Concepts
//!
//! - [`Engine`]: Configured entry point; compiles, caches and renders templates
//! - [`EngineBuilder`]: Adds locators, resolvers, helpers and global data
//! - [`Value`]: Runtime data seen by templates (convert with [`Value::from_serialize`])
//! - [`Resolver`]: One name lookup strategy, tried in priority order
//! - [`Helper`]: Named extension with access to the scope stack and block bodies
//! - [`TemplateLocator`]: Where template source comes from
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::Serialize;
//! use whisker::Engine;
//!
//! #[derive(Serialize)]
//! struct Order {
//!     customer: String,
//!     items: Vec<&'static str>,
//! }
//!
//! let engine = Engine::builder()
//!     .add_template("order", "\
//! Order for {{customer}}
//! {{#items}}
//! {{iter.index}}. {{.}}
//! {{/items}}
//! {{^items}}
//! (empty)
//! {{/items}}
//! ")
//!     .build()
//!     .unwrap();
//!
//! let out = engine
//!     .render("order", &Order { customer: "Ada".into(), items: vec!["tea", "cake"] })
//!     .unwrap();
//! assert_eq!(out, "Order for Ada\n1. tea\n2. cake\n");
//! ```
//!
//! ## Tags
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{name}}` | HTML-escaped value |
//! | `{{{name}}}`, `{{&name}}` | Raw value |
//! | `{{#name}}...{{/name}}` | Section: iterate a list, or render once for a truthy value |
//! | `{{^name}}...{{/name}}` | Inverted section: render when the value is falsy or missing |
//! | `{{>name}}` | Partial: render another template in place |
//! | `{{! text }}` | Comment |
//! | `{{=<% %>=}}` | Switch delimiters for the rest of the template |
//! | `{{#helper a b key=v}}...{{else}}...{{/helper}}` | Helper invocation |
//!
//! Names are dotted paths (`user.address.city`). The first segment is looked
//! up through the scope stack from the innermost frame outward; the rest are
//! looked up on the value found. Missing names render as nothing, never as
//! an error.
//!
//! ## Helpers
//!
//! [`EngineBuilder::register_builtin_helpers`] installs:
//!
//! - `if` / `unless`: `{{#if a b logic="or" else="-"}}`, with `{{else}}` blocks
//! - `each`: `{{#each items apply=transform}}`, where `transform` is a
//!   [`Function`] that may return the [`SKIP_RESULT`] sentinel to drop an element
//! - `with`: `{{#with user}}{{name}}{{/with}}`
//!
//! ## Iteration Metadata
//!
//! Inside a list section or `each`, `iter.index`, `iter.position`,
//! `iter.size`, `iter.isFirst`, `iter.isLast`, `iter.hasNext`, `iter.isOdd`
//! and `iter.isEven` describe the current element. The `iter` alias is
//! configurable through [`EngineConfig::iteration_alias`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
mod escape;
pub mod helper;
pub mod lexer;
pub mod locator;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod segment;
pub mod value;

pub use config::EngineConfig;
pub use context::{IterationMeta, RenderContext};
pub use engine::{Engine, EngineBuilder};
pub use error::{ResolveError, Result, WhiskerError};
pub use escape::escape_html;
pub use helper::{Helper, HelperDefinition, HelperRegistry, MatchingHelper, Options, SupportedKeys};
pub use locator::{FileSystemLocator, MapLocator, TemplateLocator, TEMPLATE_EXTENSIONS};
pub use parser::{compile, CompileOptions, CompiledTemplate};
pub use resolver::{Resolver, ResolverChain};
pub use segment::{Param, Segment};
pub use value::{Function, Number, Object, Value, SKIP_RESULT};
