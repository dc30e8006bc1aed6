//! Iteration with an optional element transform.

use super::{Helper, Options, SupportedKeys};
use crate::context::IterationMeta;
use crate::error::{Result, WhiskerError};
use crate::value::Value;

/// Names a [`Function`](crate::value::Function) applied to each element.
pub const APPLY_KEY: &str = "apply";

/// `{{#each items apply=transform}}...{{/each}}`
///
/// Renders the body once per element with the element pushed as a new scope
/// and its [`IterationMeta`] attached. When `apply` is given, each element
/// is replaced by the function's result; a result equal to
/// [`SKIP_RESULT`](crate::value::SKIP_RESULT) drops the element. Iteration
/// metadata keeps the positions of the original collection. The `{{else}}`
/// block renders when no element was rendered: the collection is empty or
/// `apply` skipped every element.
#[derive(Debug, Clone, Copy, Default)]
pub struct EachHelper;

impl Helper for EachHelper {
    fn execute(&self, options: &mut Options<'_, '_>) -> Result<()> {
        let name = options.definition().name.clone();
        let value = options.param(0).cloned().unwrap_or_default();
        let Some(elements) = value.elements() else {
            return Err(WhiskerError::helper_usage(
                name,
                format!(
                    "{} is neither a list nor an iterable object (line {})",
                    value.type_name(),
                    options.definition().line
                ),
            ));
        };
        let apply = match options.hash_value(APPLY_KEY) {
            None => None,
            Some(Value::Function(f)) => Some(f.clone()),
            Some(other) => {
                return Err(WhiskerError::helper_usage(
                    name,
                    format!("{} must be a function, got {}", APPLY_KEY, other.type_name()),
                ))
            }
        };

        let size = elements.len();
        let mut rendered_any = false;
        for (i, element) in elements.iter().enumerate() {
            let element = match &apply {
                Some(f) => {
                    let result = f.apply(element);
                    if result.is_skip() {
                        continue;
                    }
                    result
                }
                None => element.clone(),
            };
            options.push(element, Some(IterationMeta::new(i + 1, size)))?;
            let rendered = options.render_body();
            options.pop();
            rendered?;
            rendered_any = true;
        }
        if !rendered_any {
            options.render_else()?;
        }
        Ok(())
    }

    fn supported_keys(&self) -> SupportedKeys {
        SupportedKeys::Closed(&[APPLY_KEY])
    }
}
