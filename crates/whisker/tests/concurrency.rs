//! One engine shared across threads.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use whisker::Engine;

#[test]
fn test_shared_engine_renders_from_many_threads() {
    let engine = Arc::new(
        Engine::builder()
            .register_builtin_helpers()
            .add_template("row", "{{#each cells}}{{>cell}}{{/each}}")
            .add_template("cell", "<{{.}}>")
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        let cells = vec![t, i];
                        let out = engine.render("row", &json!({"cells": cells})).unwrap();
                        (out, format!("<{}><{}>", t, i))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (out, expected) in handle.join().unwrap() {
            assert_eq!(out, expected);
        }
    }
}

#[test]
fn test_invalidation_while_rendering() {
    let engine = Arc::new(
        Engine::builder()
            .add_template("t", "{{n}}")
            .build()
            .unwrap(),
    );

    let renderers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 0..100 {
                    assert_eq!(engine.render("t", &json!({"n": n})).unwrap(), n.to_string());
                }
            })
        })
        .collect();
    for _ in 0..20 {
        engine.clear_cache();
        engine.invalidate_templates(|name| name == "t");
    }

    for handle in renderers {
        handle.join().unwrap();
    }
}

#[test]
fn test_engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
}
