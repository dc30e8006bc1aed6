//! Scope push for a single value.

use super::{Helper, Options, SupportedKeys};
use crate::error::Result;

/// `{{#with value}}...{{else}}...{{/with}}`
///
/// Pushes `value` as a new scope for the body when it is truthy; renders
/// the else block otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithHelper;

impl Helper for WithHelper {
    fn execute(&self, options: &mut Options<'_, '_>) -> Result<()> {
        let value = options.param(0).cloned().unwrap_or_default();
        if value.is_falsy() {
            return options.render_else();
        }
        options.push(value, None)?;
        let rendered = options.render_body();
        options.pop();
        rendered
    }

    fn supported_keys(&self) -> SupportedKeys {
        SupportedKeys::Closed(&[])
    }
}
