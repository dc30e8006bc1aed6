//! Conditional helpers built on one predicate.
//!
//! A [`MatchingHelper`] supplies `is_matching`; the shared [`Helper`] impl
//! applies it to every positional parameter and combines the results with
//! the [`EvaluationLogic`] chosen by the `logic` key. Without parameters the
//! innermost scope value is tested instead.

use tracing::warn;

use super::{Helper, Options, SupportedKeys};
use crate::error::Result;
use crate::value::Value;

/// Selects how several parameter results combine.
pub const LOGIC_KEY: &str = "logic";
/// Text appended when the test fails and there is no `{{else}}` block.
pub const ELSE_KEY: &str = "else";

/// How parameter results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationLogic {
    /// Every parameter must match; stops at the first that does not.
    And,
    /// One parameter must match; stops at the first that does.
    Or,
}

impl EvaluationLogic {
    /// Case-insensitive parse of `and` / `or`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if value.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    /// Result decided by a single parameter, if it decides one.
    pub fn test(self, matching: bool) -> Option<bool> {
        match (self, matching) {
            (Self::And, false) => Some(false),
            (Self::Or, true) => Some(true),
            _ => None,
        }
    }

    /// Result when no parameter decided.
    pub fn default_result(self) -> bool {
        match self {
            Self::And => true,
            Self::Or => false,
        }
    }

    /// Combines `values` under this logic, short-circuiting.
    pub fn evaluate<'v>(
        self,
        values: impl IntoIterator<Item = &'v Value>,
        mut is_matching: impl FnMut(&Value) -> bool,
    ) -> bool {
        values
            .into_iter()
            .find_map(|value| self.test(is_matching(value)))
            .unwrap_or_else(|| self.default_result())
    }
}

/// A predicate-driven conditional helper.
pub trait MatchingHelper: Send + Sync {
    fn is_matching(&self, value: &Value) -> bool;

    fn default_logic(&self) -> EvaluationLogic {
        EvaluationLogic::And
    }

    /// Whether `{{#name}}` with no parameters tests the current scope.
    fn supports_empty_params(&self) -> bool {
        true
    }
}

impl<T: MatchingHelper> Helper for T {
    fn execute(&self, options: &mut Options<'_, '_>) -> Result<()> {
        if is_matched(self, options) {
            return options.render_body();
        }
        if options.has_else_body() {
            return options.render_else();
        }
        match options.hash_value(ELSE_KEY) {
            Some(text) => {
                let text = text.to_text().into_owned();
                options.append(&text)
            }
            None => Ok(()),
        }
    }

    fn required_params(&self) -> usize {
        if self.supports_empty_params() {
            0
        } else {
            1
        }
    }

    fn supported_keys(&self) -> SupportedKeys {
        SupportedKeys::Closed(&[LOGIC_KEY, ELSE_KEY])
    }
}

fn is_matched<H: MatchingHelper + ?Sized>(helper: &H, options: &Options<'_, '_>) -> bool {
    match options.params() {
        [] => helper.is_matching(options.peek()),
        [single] => helper.is_matching(single),
        params => logic(helper, options).evaluate(params, |value| helper.is_matching(value)),
    }
}

fn logic<H: MatchingHelper + ?Sized>(helper: &H, options: &Options<'_, '_>) -> EvaluationLogic {
    let Some(value) = options.hash_value(LOGIC_KEY) else {
        return helper.default_logic();
    };
    let custom = value.to_text();
    EvaluationLogic::parse(&custom).unwrap_or_else(|| {
        let fallback = helper.default_logic();
        warn!(
            helper = %options.definition().name,
            logic = %custom,
            ?fallback,
            "unsupported evaluation logic, using the default"
        );
        fallback
    })
}

/// `{{#if a b}}`: renders when its parameters are truthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfHelper;

impl MatchingHelper for IfHelper {
    fn is_matching(&self, value: &Value) -> bool {
        value.is_truthy()
    }
}

/// `{{#unless a b}}`: renders when its parameters are falsy.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlessHelper;

impl MatchingHelper for UnlessHelper {
    fn is_matching(&self, value: &Value) -> bool {
        value.is_falsy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(EvaluationLogic::parse("OR"), Some(EvaluationLogic::Or));
        assert_eq!(EvaluationLogic::parse("And"), Some(EvaluationLogic::And));
        assert_eq!(EvaluationLogic::parse("xor"), None);
    }

    #[test]
    fn test_and_short_circuits() {
        let values = [Value::from(true), Value::from(false), Value::from(true)];
        let mut seen = 0;
        let result = EvaluationLogic::And.evaluate(&values, |v| {
            seen += 1;
            v.is_truthy()
        });
        assert!(!result);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_or_short_circuits() {
        let values = [Value::from(false), Value::from(1), Value::from(false)];
        let mut seen = 0;
        let result = EvaluationLogic::Or.evaluate(&values, |v| {
            seen += 1;
            v.is_truthy()
        });
        assert!(result);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_default_results() {
        let none: [Value; 0] = [];
        assert!(EvaluationLogic::And.evaluate(&none, Value::is_truthy));
        assert!(!EvaluationLogic::Or.evaluate(&none, Value::is_truthy));
    }

    #[test]
    fn test_predicates() {
        assert!(IfHelper.is_matching(&Value::from("x")));
        assert!(!IfHelper.is_matching(&Value::Null));
        assert!(UnlessHelper.is_matching(&Value::from(0)));
        assert_eq!(IfHelper.required_params(), 0);
    }
}
