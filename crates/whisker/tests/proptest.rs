//! Property-based tests for whisker using proptest.

use proptest::prelude::*;
use serde_json::json;
use whisker::Engine;

// ============================================================================
// Test helpers
// ============================================================================

fn engine() -> Engine {
    Engine::builder()
        .register_builtin_helpers()
        .build()
        .unwrap()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// Text that cannot contain a tag opener
fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \\t\\n\\r.,;:!?<>&\"'}#^/=-]{0,200}"
}

// A template assembled from a few known-good fragments
fn template_strategy() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        "[a-z \\n]{0,10}",
        Just("{{name}}".to_string()),
        Just("{{{name}}}".to_string()),
        Just("{{#items}}[{{.}}:{{iter.index}}]{{/items}}".to_string()),
        Just("{{^items}}none{{/items}}".to_string()),
        Just("{{#if name}}yes{{else}}no{{/if}}".to_string()),
        Just("{{#each items}}{{.}}\n{{/each}}".to_string()),
        Just("{{! note }}".to_string()),
    ];
    prop::collection::vec(fragment, 0..8).prop_map(|parts| parts.concat())
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// A template without tags renders to itself.
    #[test]
    fn tagless_templates_round_trip(source in plain_text()) {
        let out = engine().render_str(&source, &json!({})).unwrap();
        prop_assert_eq!(out, source);
    }

    /// Escaped output never carries markup and decodes to the raw value.
    #[test]
    fn escaped_output_is_reversible(value in ".{0,64}") {
        let engine = engine();
        let data = json!({"v": value});
        let escaped = engine.render_str("{{v}}", &data).unwrap();
        let raw = engine.render_str("{{{v}}}", &data).unwrap();

        prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
        prop_assert_eq!(unescape(&escaped), value.clone());
        prop_assert_eq!(raw, value);
    }

    /// Compiling the same source twice gives the same tree, and rendering
    /// the same data twice gives the same text.
    #[test]
    fn compilation_and_rendering_are_deterministic(
        source in template_strategy(),
        name in "[a-z<>]{0,5}",
        items in prop::collection::vec(0i64..100, 0..5),
    ) {
        let engine = engine();
        let first = engine.compile_str("t", &source).unwrap();
        let second = engine.compile_str("t", &source).unwrap();
        prop_assert_eq!(first.segments(), second.segments());

        let data = json!({"name": name, "items": items});
        let a = engine.render_str(&source, &data).unwrap();
        let b = engine.render_str(&source, &data).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Section iteration visits every element once, in order, with
    /// one-based indexes.
    #[test]
    fn iteration_visits_every_element(items in prop::collection::vec(any::<i32>(), 0..50)) {
        let out = engine()
            .render_str("{{#items}}{{iter.index}}={{.}};{{/items}}", &json!({"items": items}))
            .unwrap();
        let expected: String = items
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{}={};", i + 1, n))
            .collect();
        prop_assert_eq!(out, expected);
    }

    /// `if` with OR logic agrees with `||` over the parameters.
    #[test]
    fn or_logic_matches_boolean_or(a in any::<bool>(), b in any::<bool>(), c in any::<bool>()) {
        let out = engine()
            .render_str(
                "{{#if a b c logic=\"or\"}}1{{else}}0{{/if}}",
                &json!({"a": a, "b": b, "c": c}),
            )
            .unwrap();
        prop_assert_eq!(out == "1", a || b || c);
    }

    /// `unless` with the default AND logic renders when every parameter is falsy.
    #[test]
    fn unless_requires_all_falsy(a in any::<bool>(), b in any::<bool>()) {
        let out = engine()
            .render_str("{{#unless a b}}1{{else}}0{{/unless}}", &json!({"a": a, "b": b}))
            .unwrap();
        prop_assert_eq!(out == "1", !a && !b);
    }
}
