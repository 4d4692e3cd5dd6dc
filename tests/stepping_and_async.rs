use std::cell::RefCell;
use std::rc::Rc;

use sandjs::{Config, Interpreter, Status, Value};

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

#[test]
fn run_reports_not_paused_for_plain_programs() {
    let mut interp = Interpreter::new("var x = 1; x;").unwrap();
    let paused = interp.run().unwrap();
    assert!(!paused);
    assert_eq!(*interp.value(), Value::Number(1.0));
}

#[test]
fn step_advances_to_completion() {
    let mut interp = Interpreter::new("var x = 0; x = x + 1; x = x + 1; x;").unwrap();
    let mut steps = 0;
    while interp.step().unwrap() {
        steps += 1;
        assert!(steps < 10_000, "step() failed to make progress");
    }
    assert_eq!(*interp.value(), Value::Number(2.0));
    assert_eq!(interp.status(), Status::Done);
}

#[test]
fn step_returns_false_only_after_termination() {
    let mut interp = Interpreter::new("1;").unwrap();
    while interp.step().unwrap() {}
    assert!(!interp.step().unwrap());
    assert!(!interp.step().unwrap());
}

#[test]
fn run_is_idempotent_after_termination() {
    let mut interp = Interpreter::new("var x = 41; x + 1;").unwrap();
    assert!(!interp.run().unwrap());
    let value = interp.value().clone();
    assert!(!interp.run().unwrap());
    assert_eq!(*interp.value(), value);
}

#[test]
fn async_function_pauses_and_resumes() {
    let token_store = Rc::new(RefCell::new(None));
    let store = token_store.clone();
    let mut interp = Interpreter::with_init(
        "var r = slowAnswer(); r + 1;",
        Config::default(),
        move |interp, global| {
            let f = interp.create_async_function(move |_interp, _this, _args, token| {
                *store.borrow_mut() = Some(token);
            });
            interp.set_value(global, "slowAnswer", f);
        },
    )
    .unwrap();

    let paused = interp.run().unwrap();
    assert!(paused);
    assert_eq!(interp.status(), Status::Async);

    // further stepping is a no-op while suspended
    assert!(interp.step().unwrap());
    assert_eq!(interp.status(), Status::Async);

    let token = token_store.borrow_mut().take().expect("async fn never ran");
    interp.resume(token, Value::Number(41.0)).unwrap();
    assert_eq!(interp.status(), Status::Step);
    assert!(!interp.run().unwrap());
    assert_eq!(*interp.value(), Value::Number(42.0));
}

#[test]
fn async_value_lands_in_the_suspended_expression() {
    let token_store = Rc::new(RefCell::new(None));
    let store = token_store.clone();
    let mut interp = Interpreter::with_init(
        "var parts = ['a']; parts.push(fetchPart()); parts.join('-');",
        Config::default(),
        move |interp, global| {
            let f = interp.create_async_function(move |_interp, _this, _args, token| {
                *store.borrow_mut() = Some(token);
            });
            interp.set_value(global, "fetchPart", f);
        },
    )
    .unwrap();
    assert!(interp.run().unwrap());
    let token = token_store.borrow_mut().take().unwrap();
    interp.resume(token, Value::str("b")).unwrap();
    interp.run().unwrap();
    assert_eq!(*interp.value(), Value::str("a-b"));
}

#[test]
fn stale_resume_token_is_rejected() {
    let token_store = Rc::new(RefCell::new(None));
    let store = token_store.clone();
    let mut interp = Interpreter::with_init(
        "wait(); wait();",
        Config::default(),
        move |interp, global| {
            let f = interp.create_async_function(move |_interp, _this, _args, token| {
                *store.borrow_mut() = Some(token);
            });
            interp.set_value(global, "wait", f);
        },
    )
    .unwrap();
    assert!(interp.run().unwrap());
    let first = token_store.borrow_mut().take().unwrap();
    interp.resume(first, Value::Undefined).unwrap();
    assert!(interp.run().unwrap());
    // the first token is spent; only the second suspension's token works
    assert!(interp.resume(first, Value::Undefined).is_err());
    let second = token_store.borrow_mut().take().unwrap();
    interp.resume(second, Value::Undefined).unwrap();
    assert!(!interp.run().unwrap());
}

#[test]
fn resume_throw_injects_the_error_at_the_suspension_point() {
    let token_store = Rc::new(RefCell::new(None));
    let store = token_store.clone();
    let mut interp = Interpreter::with_init(
        "var out; try { out = wait(); } catch (e) { out = 'caught:' + e.message; } out;",
        Config::default(),
        move |interp, global| {
            let f = interp.create_async_function(move |_interp, _this, _args, token| {
                *store.borrow_mut() = Some(token);
            });
            interp.set_value(global, "wait", f);
        },
    )
    .unwrap();
    assert!(interp.run().unwrap());
    let token = token_store.borrow_mut().take().unwrap();
    let boom = {
        let msg = interp.make_error(sandjs::ErrorKind::Generic, "boom".to_string());
        msg.0
    };
    interp.resume_throw(token, boom).unwrap();
    assert!(!interp.run().unwrap());
    assert_eq!(*interp.value(), Value::str("caught:boom"));
}

#[test]
fn native_function_runs_synchronously() {
    let mut interp = Interpreter::with_init(
        "triple(14);",
        Config::default(),
        |interp, global| {
            let f = interp.create_native_function(|interp, _this, args| {
                let n = match args.first() {
                    Some(Value::Number(n)) => *n,
                    _ => f64::NAN,
                };
                let _ = interp;
                Ok(Value::Number(n * 3.0))
            });
            interp.set_value(global, "triple", f);
        },
    )
    .unwrap();
    assert!(!interp.run().unwrap());
    assert_eq!(*interp.value(), Value::Number(42.0));
}

#[test]
fn append_code_extends_a_terminated_program() {
    let mut interp = Interpreter::new("var x = 1; x;").unwrap();
    assert!(!interp.run().unwrap());
    assert_eq!(interp.status(), Status::Done);
    assert_eq!(*interp.value(), Value::Number(1.0));

    interp.append_code("x = x + 41; x;").unwrap();
    assert_eq!(interp.status(), Status::Step);
    assert!(!interp.run().unwrap());
    assert_eq!(*interp.value(), Value::Number(42.0));
}

#[test]
fn append_code_sees_existing_bindings() {
    let mut interp = Interpreter::new("function f(n) { return n * 2; }").unwrap();
    interp.run().unwrap();
    interp.append_code("f(21);").unwrap();
    interp.run().unwrap();
    assert_eq!(*interp.value(), Value::Number(42.0));
}

#[test]
fn polyfill_steps_are_absorbed() {
    // construction runs the polyfills to completion; the first observable
    // step is already user code
    let mut interp = Interpreter::new("var a = [3, 1]; a.sort(); a[0];").unwrap();
    let mut steps = 0;
    while interp.step().unwrap() {
        steps += 1;
        assert!(steps < 100_000);
    }
    assert_eq!(*interp.value(), Value::Number(1.0));
}

#[test]
fn host_seeding_scenario() {
    let mut interp = Interpreter::with_init(
        "inputObject.b = 2; this.inputObject;",
        Config::default(),
        |interp, global| {
            let seeded = interp.native_to_pseudo(&serde_json::json!({ "a": 1 }));
            interp.set_value(global, "inputObject", seeded);
        },
    )
    .unwrap();
    assert!(!interp.run().unwrap());
    let out = interp.value().clone();
    assert_eq!(
        interp.pseudo_to_native(&out),
        serde_json::json!({ "a": 1, "b": 2 })
    );
}
