//! Built-in and custom helpers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value as Json};
use whisker::{
    Engine, Function, Helper, MatchingHelper, Options, Result, SupportedKeys, Value, WhiskerError,
};

fn engine(template: &str) -> Engine {
    Engine::builder()
        .register_builtin_helpers()
        .add_template("t", template)
        .build()
        .unwrap()
}

fn render(template: &str, data: Json) -> String {
    engine(template).render("t", &data).unwrap()
}

fn map(entries: Vec<(&str, Value)>) -> Value {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<BTreeMap<_, _>>()
        .into()
}

// ============================================================================
// if / unless
// ============================================================================

#[test]
fn test_if_single_param() {
    assert_eq!(render("{{#if a}}yes{{/if}}", json!({"a": 1})), "yes");
    assert_eq!(render("[{{#if a}}yes{{/if}}]", json!({"a": 0})), "[]");
    assert_eq!(render("[{{#if missing}}yes{{/if}}]", json!({})), "[]");
}

#[test]
fn test_if_and_logic_by_default() {
    let data = json!({"t": true, "f": false});
    assert_eq!(render("[{{#if t f}}yes{{/if}}]", data.clone()), "[]");
    assert_eq!(render("[{{#if t t}}yes{{/if}}]", data), "[yes]");
}

#[test]
fn test_if_or_logic() {
    let data = json!({"t": true, "f": false});
    assert_eq!(render("[{{#if t f logic=\"or\"}}yes{{/if}}]", data.clone()), "[yes]");
    assert_eq!(render("[{{#if f f logic='OR'}}yes{{/if}}]", data), "[]");
}

#[test]
fn test_unknown_logic_falls_back_to_default() {
    let data = json!({"t": true, "f": false});
    assert_eq!(render("[{{#if t f logic=\"xor\"}}yes{{/if}}]", data), "[]");
}

#[test]
fn test_logic_from_data() {
    let data = json!({"t": true, "f": false, "mode": "or"});
    assert_eq!(render("{{#if f t logic=mode}}yes{{/if}}", data), "yes");
}

#[test]
fn test_if_without_params_tests_current_scope() {
    let data = json!({"items": ["a", "", "c"]});
    assert_eq!(render("{{#each items}}{{#if}}{{.}}{{/if}}{{/each}}", data), "ac");
}

#[test]
fn test_else_key_appended_verbatim() {
    let data = json!({"a": false});
    assert_eq!(render("{{#if a else=\"<none> & more\"}}yes{{/if}}", data), "<none> & more");
}

#[test]
fn test_else_block() {
    let template = "{{#if a}}yes{{else}}no{{/if}}";
    assert_eq!(render(template, json!({"a": true})), "yes");
    assert_eq!(render(template, json!({"a": false})), "no");
}

#[test]
fn test_else_block_wins_over_else_key() {
    assert_eq!(
        render("{{#if a else=\"key\"}}yes{{else}}block{{/if}}", json!({})),
        "block"
    );
}

#[test]
fn test_standalone_else_lines() {
    let template = "\
{{#if a}}
yes
{{else}}
no
{{/if}}
";
    assert_eq!(render(template, json!({"a": false})), "no\n");
}

#[test]
fn test_unless() {
    let data = json!({"a": 0, "b": "x"});
    assert_eq!(render("{{#unless a}}empty{{/unless}}", data.clone()), "empty");
    assert_eq!(render("[{{#unless a b}}both{{/unless}}]", data.clone()), "[]");
    assert_eq!(
        render("[{{#unless a b logic=\"or\"}}either{{/unless}}]", data),
        "[either]"
    );
}

#[test]
fn test_if_rejects_unknown_keys_at_compile_time() {
    let engine = engine("{{#if a bogus=1}}x{{/if}}");
    let err = engine.render("t", &json!({})).unwrap_err();
    assert!(matches!(err, WhiskerError::InvalidHelperUsage { ref helper, .. } if helper == "if"));
}

#[test]
fn test_helper_name_shadows_data_key() {
    let data = json!({"if": "data"});
    assert_eq!(render("[{{if}}][{{this.if}}]", data), "[][data]");
}

// ============================================================================
// each
// ============================================================================

#[test]
fn test_each_iterates_with_metadata() {
    let data = json!({"items": ["a", "b", "c"]});
    assert_eq!(
        render(
            "{{#each items}}{{iter.position}}{{.}}{{#iter.hasNext}},{{/iter.hasNext}}{{/each}}",
            data
        ),
        "0a,1b,2c"
    );
}

#[test]
fn test_each_else_block_on_empty() {
    let template = "{{#each items}}{{.}}{{else}}nothing{{/each}}";
    assert_eq!(render(template, json!({"items": []})), "nothing");
    assert_eq!(render(template, json!({"items": [1]})), "1");
}

#[test]
fn test_each_else_block_when_every_element_is_skipped() {
    let engine = engine("{{#each items apply=drop}}{{.}}{{else}}all skipped{{/each}}");
    let data = map(vec![
        ("items", Value::from(vec![1, 2])),
        ("drop", Value::function(|_: &Value| Value::skip())),
    ]);
    assert_eq!(engine.render_value("t", data).unwrap(), "all skipped");
}

#[test]
fn test_each_apply_transforms_elements() {
    let engine = engine("{{#each items apply=double}}{{.}} {{/each}}");
    let double = Function::new(|v: &Value| match v.as_number() {
        Some(n) => Value::from(n.to_f64() * 2.0),
        None => v.clone(),
    });
    let data = map(vec![
        ("items", Value::from(vec![1, 2, 3])),
        ("double", Value::Function(double)),
    ]);
    assert_eq!(engine.render_value("t", data).unwrap(), "2 4 6 ");
}

#[test]
fn test_each_apply_skip_result() {
    let engine = engine("{{#each items apply=odd}}[{{.}}:{{iter.index}}]{{/each}}");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let odd = Function::new(move |v: &Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        match v.as_number().and_then(|n| n.as_usize()) {
            Some(n) if n % 2 == 0 => Value::skip(),
            _ => v.clone(),
        }
    });
    let data = map(vec![
        ("items", Value::from(vec![1, 2, 3])),
        ("odd", Value::Function(odd)),
    ]);
    // two renders, positions of the original collection
    assert_eq!(engine.render_value("t", data).unwrap(), "[1:1][3:3]");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_each_rejects_non_iterables() {
    let engine = engine("{{#each item}}x{{/each}}");
    for data in [json!({"item": "text"}), json!({"item": {"a": 1}}), json!({})] {
        let err = engine.render("t", &data).unwrap_err();
        assert!(matches!(err, WhiskerError::InvalidHelperUsage { .. }), "{:?}", data);
    }
}

#[test]
fn test_each_rejects_non_function_apply() {
    let engine = engine("{{#each items apply=name}}x{{/each}}");
    let err = engine
        .render("t", &json!({"items": [1], "name": "nope"}))
        .unwrap_err();
    assert!(err.to_string().contains("apply"));
}

#[test]
fn test_each_requires_a_param() {
    let engine = engine("{{#each}}x{{/each}}");
    assert!(matches!(
        engine.render("t", &json!({})),
        Err(WhiskerError::InvalidHelperUsage { .. })
    ));
}

#[test]
fn test_each_pops_scope_after_error() {
    // the inner each fails; the error reaches the caller intact
    let engine = engine("{{#each rows}}{{#each .}}x{{/each}}{{/each}}");
    let err = engine.render("t", &json!({"rows": [[1], "bad"]})).unwrap_err();
    assert!(matches!(err, WhiskerError::InvalidHelperUsage { .. }));
}

// ============================================================================
// with
// ============================================================================

#[test]
fn test_with() {
    let template = "{{#with user}}{{name}}{{else}}anonymous{{/with}}";
    assert_eq!(render(template, json!({"user": {"name": "Ada"}})), "Ada");
    assert_eq!(render(template, json!({})), "anonymous");
}

// ============================================================================
// Custom helpers
// ============================================================================

struct Repeat;

impl Helper for Repeat {
    fn execute(&self, options: &mut Options<'_, '_>) -> Result<()> {
        let times = options
            .param(0)
            .and_then(Value::as_number)
            .and_then(|n| n.as_usize())
            .ok_or_else(|| WhiskerError::helper_usage("repeat", "count must be a number"))?;
        for i in 0..times {
            options.push(Value::from(i), None)?;
            options.render_body()?;
            options.pop();
        }
        Ok(())
    }

    fn supported_keys(&self) -> SupportedKeys {
        SupportedKeys::Open(&["sep"])
    }
}

#[test]
fn test_custom_block_helper() {
    let engine = Engine::builder()
        .register_helper("repeat", Repeat)
        .add_template("t", "{{#repeat 3 extra=1}}<{{.}}>{{/repeat}}")
        .build()
        .unwrap();
    // unknown open keys only warn
    assert_eq!(engine.render("t", &json!({})).unwrap(), "<0><1><2>");
}

#[test]
fn test_custom_helper_errors_propagate() {
    let engine = Engine::builder()
        .register_helper("repeat", Repeat)
        .add_template("t", "{{#repeat 'x'}}{{/repeat}}")
        .build()
        .unwrap();
    assert!(engine.render("t", &json!({})).is_err());
}

struct Positive;

impl MatchingHelper for Positive {
    fn is_matching(&self, value: &Value) -> bool {
        value.as_number().is_some_and(|n| n.to_f64() > 0.0)
    }
}

#[test]
fn test_custom_matching_helper() {
    let engine = Engine::builder()
        .register_helper("positive", Positive)
        .add_template("t", "{{#positive a b logic=\"or\" else=\"none\"}}some{{/positive}}")
        .build()
        .unwrap();
    assert_eq!(engine.render("t", &json!({"a": -1, "b": 2})).unwrap(), "some");
    assert_eq!(engine.render("t", &json!({"a": -1, "b": 0})).unwrap(), "none");
}

#[test]
fn test_first_registered_helper_wins() {
    let engine = Engine::builder()
        .register_helper("check", Positive)
        .register_builtin_helpers()
        .register_helper("if", Positive)
        .add_template("t", "{{#if a}}yes{{else}}no{{/if}}")
        .build()
        .unwrap();
    // the built-in `if` keeps its truthiness predicate
    assert_eq!(engine.render("t", &json!({"a": "text"})).unwrap(), "yes");
    assert!(engine.helpers().contains("check"));
}
