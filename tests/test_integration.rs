//! Integration tests for the script engine.
//!
//! These tests parse source text and run it through a fresh `Vm`, checking completion values
//! and thrown errors end to end.

extern crate clove;

use clove::runner::api::{Vm, VmError};
use clove::runner::ds::object::ObjectKind;
use clove::runner::ds::realm::RealmConfig;
use clove::runner::ds::value::JsValue;

/// Helper to run a program and return its completion value.
fn run_js(code: &str) -> Result<JsValue, VmError> {
    Vm::new().evaluate_program(code, "test.js")
}

fn run_js_with(config: RealmConfig, code: &str) -> Result<JsValue, VmError> {
    Vm::with_config(config).evaluate_program(code, "test.js")
}

fn num(n: f64) -> JsValue {
    JsValue::Number(n)
}

fn string(s: &str) -> JsValue {
    JsValue::from_str(s)
}

// ============================================================================
// Expressions and operators
// ============================================================================

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(run_js("1 + 2 * 3").unwrap(), num(7.0));
    assert_eq!(run_js("(1 + 2) * 3").unwrap(), num(9.0));
    assert_eq!(run_js("7 % -3").unwrap(), num(1.0));
    assert_eq!(run_js("-7 >> 1").unwrap(), num(-4.0));
    assert_eq!(run_js("-1 >>> 28").unwrap(), num(15.0));
}

#[test]
fn test_string_concatenation_and_conversion() {
    assert_eq!(run_js("'a' + 1 + 2").unwrap(), string("a12"));
    assert_eq!(run_js("1 + 2 + 'a'").unwrap(), string("3a"));
    assert_eq!(run_js("'0x1A' * 1").unwrap(), num(26.0));
    assert_eq!(run_js("' 12 ' - 2").unwrap(), num(10.0));
    assert_eq!(run_js("String(1e21)").unwrap(), string("1e+21"));
    assert_eq!(run_js("String(0.1 + 0.2)").unwrap(), string("0.30000000000000004"));
}

#[test]
fn test_object_plus_string_feeds_string_operators() {
    let prelude = "var o = {valueOf: function () { return 1; }};";
    assert_eq!(run_js(&format!("{} o + 'a'", prelude)).unwrap(), string("1a"));
    assert_eq!(
        run_js(&format!("{} (o + 'a') < 'b'", prelude)).unwrap(),
        JsValue::Boolean(true)
    );
    assert_eq!(
        run_js(&format!("{} ('x' + o) + (o + 'y')", prelude)).unwrap(),
        string("x11y")
    );
}

#[test]
fn test_equality_algorithms() {
    assert_eq!(run_js("null == undefined").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("null === undefined").unwrap(), JsValue::Boolean(false));
    assert_eq!(run_js("'1' == 1").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("NaN == NaN").unwrap(), JsValue::Boolean(false));
    assert_eq!(run_js("({}) == '[object Object]'").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("'b' > 'a'").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("undefined < 1").unwrap(), JsValue::Boolean(false));
}

#[test]
fn test_typeof() {
    assert_eq!(run_js("typeof notDeclared").unwrap(), string("undefined"));
    assert_eq!(run_js("typeof null").unwrap(), string("object"));
    assert_eq!(run_js("typeof function () {}").unwrap(), string("function"));
    assert_eq!(run_js("typeof 'x'").unwrap(), string("string"));
}

#[test]
fn test_update_and_compound_assignment() {
    assert_eq!(run_js("var a = 1; a += 2; a *= 3; a").unwrap(), num(9.0));
    assert_eq!(run_js("var a = 1; var b = a++; b * 10 + a").unwrap(), num(12.0));
    assert_eq!(run_js("var o = {n: 1}; ++o.n; o['n']--; o.n").unwrap(), num(1.0));
}

#[test]
fn test_logical_operators_short_circuit() {
    assert_eq!(run_js("var c = 0; false && c++; true || c++; c").unwrap(), num(0.0));
    assert_eq!(run_js("0 || 'x'").unwrap(), string("x"));
    assert_eq!(run_js("1 && null").unwrap(), JsValue::Null);
}

#[test]
fn test_in_and_instanceof() {
    assert_eq!(run_js("'a' in {a: 1}").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("'toString' in {}").unwrap(), JsValue::Boolean(true));
    assert_eq!(
        run_js("function F() {} var B = F.bind(null); new F() instanceof B").unwrap(),
        JsValue::Boolean(true)
    );
    assert!(run_js("'a' in 'abc'").is_err());
}

#[test]
fn test_delete_semantics() {
    assert_eq!(run_js("var o = {a: 1}; delete o.a; 'a' in o").unwrap(), JsValue::Boolean(false));
    assert_eq!(run_js("var v = 1; delete v").unwrap(), JsValue::Boolean(false));
    assert_eq!(run_js("g = 1; delete g").unwrap(), JsValue::Boolean(true));
    assert_eq!(run_js("delete 1").unwrap(), JsValue::Boolean(true));
    assert!(run_js(
        "'use strict'; var o = {}; Object.defineProperty(o, 'x', {value: 1}); delete o.x"
    )
    .is_err());
}

// ============================================================================
// Statements and completion values
// ============================================================================

#[test]
fn test_completion_values() {
    assert_eq!(run_js("1; if (true) {}").unwrap(), num(1.0));
    assert_eq!(run_js("eval('1; if (true) {}')").unwrap(), num(1.0));
    assert_eq!(run_js("var x = 0; do { x++; } while (x < 3)").unwrap(), num(2.0));
    assert_eq!(run_js("").unwrap(), JsValue::Undefined);
}

#[test]
fn test_continue_skips_iteration() {
    let v = run_js(
        "var acc = []; for (var i = 0; i < 3; i++) { if (i == 1) continue; acc.push(i); } acc.join()",
    )
    .unwrap();
    assert_eq!(v, string("0,2"));
}

#[test]
fn test_labeled_break_exits_both_loops() {
    let v = run_js(
        "var n = 0; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { n++; break outer; } } n * 10 + i",
    )
    .unwrap();
    assert_eq!(v, num(10.0));
}

#[test]
fn test_labeled_continue() {
    let v = run_js(
        "var s = ''; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { if (j == 1) continue outer; s += i + '' + j; } } s",
    )
    .unwrap();
    assert_eq!(v, string("001020"));
}

#[test]
fn test_switch_fallthrough_and_default() {
    let code = "function f(x) { var r = ''; switch (x) { case 1: r += 'a'; case 2: r += 'b'; break; default: r += 'd'; case 3: r += 'c'; } return r; }";
    assert_eq!(run_js(&format!("{} f(1)", code)).unwrap(), string("ab"));
    assert_eq!(run_js(&format!("{} f(2)", code)).unwrap(), string("b"));
    assert_eq!(run_js(&format!("{} f(3)", code)).unwrap(), string("c"));
    assert_eq!(run_js(&format!("{} f(9)", code)).unwrap(), string("dc"));
}

#[test]
fn test_switch_selector_evaluated_once_in_order() {
    let code = "var n = 0; function sideEffect() { n++; return 5; }
        function run(x) { var r; switch (x) { case sideEffect(): r = 1; break; case x: r = 2; break; } return r; }";
    assert_eq!(run_js(&format!("{} run(2) * 10 + n", code)).unwrap(), num(21.0));
    assert_eq!(run_js(&format!("{} run(5) * 10 + n", code)).unwrap(), num(11.0));
}

#[test]
fn test_switch_on_strings() {
    let v = run_js("var r; switch ('b') { case 'a': r = 1; break; case 'b': r = 2; break; } r").unwrap();
    assert_eq!(v, num(2.0));
}

#[test]
fn test_for_in_enumeration() {
    let v = run_js(
        "function P() { this.own = 1; } P.prototype.inherited = 2; var s = ''; for (var k in new P()) s += k + ','; s",
    )
    .unwrap();
    assert_eq!(v, string("own,inherited,"));
}

#[test]
fn test_for_in_skips_deleted_names() {
    let v = run_js(
        "var o = {a: 1, b: 2, c: 3}; var s = ''; for (var k in o) { s += k; delete o.c; } s",
    )
    .unwrap();
    assert_eq!(v, string("ab"));
}

#[test]
fn test_try_catch_finally() {
    assert_eq!(run_js("try { throw 1; } catch (e) { e + 1 }").unwrap(), num(2.0));
    assert_eq!(
        run_js("var log = ''; try { log += 't'; } finally { log += 'f'; } log").unwrap(),
        string("tf")
    );
    assert_eq!(
        run_js("function f() { try { return 1; } finally { return 2; } } f()").unwrap(),
        num(2.0)
    );
    assert_eq!(
        run_js("function f() { try { throw 1; } finally { return 3; } } f()").unwrap(),
        num(3.0)
    );
}

#[test]
fn test_catch_scope_is_separate() {
    let v = run_js("var e = 'outer'; try { throw 'inner'; } catch (e) { } e").unwrap();
    assert_eq!(v, string("outer"));
}

#[test]
fn test_with_statement() {
    let v = run_js("var o = {a: 1}; var a = 5; with (o) { a = 2; } a * 10 + o.a").unwrap();
    assert_eq!(v, num(52.0));
}

// ============================================================================
// Functions and closures
// ============================================================================

#[test]
fn test_closures_capture_variables() {
    let v = run_js(
        "function counter() { var n = 0; return function () { return ++n; }; } var c = counter(); c(); c(); c()",
    )
    .unwrap();
    assert_eq!(v, num(3.0));
}

#[test]
fn test_hoisting() {
    assert_eq!(run_js("f(); function f() { return 1; }").unwrap(), num(1.0));
    assert_eq!(run_js("typeof v; var v = 1; typeof w").unwrap(), string("undefined"));
    assert_eq!(run_js("var t = typeof h; var h = 1; t").unwrap(), string("undefined"));
}

#[test]
fn test_named_function_expression_binding() {
    assert_eq!(
        run_js("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5)").unwrap(),
        num(120.0)
    );
    assert_eq!(run_js("var f = function g() {}; typeof g").unwrap(), string("undefined"));
}

#[test]
fn test_arguments_aliasing_non_strict() {
    let v = run_js("function f(a) { arguments[0] = 9; return a; } f(1)").unwrap();
    assert_eq!(v, num(9.0));
    let v = run_js("function f(a) { a = 4; return arguments[0]; } f(1)").unwrap();
    assert_eq!(v, num(4.0));
}

#[test]
fn test_arguments_not_aliased_in_strict_code() {
    let v = run_js("function f(a) { 'use strict'; arguments[0] = 9; return a; } f(1)").unwrap();
    assert_eq!(v, num(1.0));
}

#[test]
fn test_arguments_length_and_callee() {
    assert_eq!(run_js("function f() { return arguments.length; } f(1, 2, 3)").unwrap(), num(3.0));
    assert_eq!(
        run_js("function f() { return arguments.callee === f; } f()").unwrap(),
        JsValue::Boolean(true)
    );
    assert!(run_js("function f() { 'use strict'; return arguments.callee; } f()").is_err());
}

#[test]
fn test_this_binding() {
    assert_eq!(
        run_js("var o = {v: 3, get: function () { return this.v; }}; o.get()").unwrap(),
        num(3.0)
    );
    assert_eq!(
        run_js("function f() { return this; } f() === global").unwrap(),
        JsValue::Boolean(true)
    );
    assert_eq!(
        run_js("function f() { 'use strict'; return this; } f()").unwrap(),
        JsValue::Undefined
    );
    assert_eq!(
        run_js("function f() { return typeof this; } f.call(5)").unwrap(),
        string("object")
    );
}

#[test]
fn test_constructors_and_prototypes() {
    let v = run_js(
        "function P(x) { this.x = x; } P.prototype.double = function () { return this.x * 2; }; new P(21).double()",
    )
    .unwrap();
    assert_eq!(v, num(42.0));
    let v = run_js("function F() { return {y: 1}; } new F().y").unwrap();
    assert_eq!(v, num(1.0));
    assert!(run_js("var o = {}; new o.toString()").is_err());
}

#[test]
fn test_accessors_in_object_literals() {
    let v = run_js(
        "var o = { _v: 1, get v() { return this._v; }, set v(x) { this._v = x * 2; } }; o.v = 5; o.v",
    )
    .unwrap();
    assert_eq!(v, num(10.0));
}

#[test]
fn test_primitive_base_reads_and_writes() {
    assert_eq!(run_js("'abc'.length").unwrap(), num(3.0));
    assert_eq!(run_js("'abc'[1]").unwrap(), string("b"));
    assert_eq!(run_js("var s = 'abc'; s.x = 1; s.x").unwrap(), JsValue::Undefined);
    assert!(run_js("'use strict'; var s = 'abc'; s.x = 1;").is_err());
    assert!(run_js("'use strict'; 'abc'.length = 1;").is_err());
}

// ============================================================================
// Eval
// ============================================================================

#[test]
fn test_direct_eval_sees_local_scope() {
    let v = run_js("function f() { var x = 3; return eval('x + 1'); } f()").unwrap();
    assert_eq!(v, num(4.0));
    let v = run_js("function f() { eval('var y = 2'); return y; } f()").unwrap();
    assert_eq!(v, num(2.0));
}

#[test]
fn test_indirect_eval_uses_global_scope() {
    let v = run_js("var x = 'global'; function f() { var x = 'local'; var e = eval; return e('x'); } f()")
        .unwrap();
    assert_eq!(v, string("global"));
}

#[test]
fn test_strict_eval_keeps_declarations_private() {
    let v = run_js("'use strict'; eval('var z = 1'); typeof z").unwrap();
    assert_eq!(v, string("undefined"));
}

// ============================================================================
// Errors and limits
// ============================================================================

#[test]
fn test_reference_errors() {
    let e = run_js("missing + 1").unwrap_err();
    assert!(e.to_string().starts_with("Uncaught ReferenceError"));
    assert!(run_js("'use strict'; undeclared = 1;").is_err());
    assert_eq!(run_js("sloppy = 1; sloppy").unwrap(), num(1.0));
}

#[test]
fn test_calling_non_callable_is_type_error() {
    let v = run_js("try { (1)(); } catch (e) { e instanceof TypeError }").unwrap();
    assert_eq!(v, JsValue::Boolean(true));
}

#[test]
fn test_stack_depth_boundary() {
    let config = RealmConfig::default()
        .with_stack_depth_limit(60)
        .with_stack_trace_limit(5);
    let r = run_js_with(config, "function f() { return f(); } try { f(); } catch (e) { 'caught' }");
    match r {
        Err(VmError::StackOverflow(JsValue::Object(e))) => match &e.borrow().kind {
            ObjectKind::Error(frames) => assert!(frames.len() <= 5),
            _ => panic!("not an error object"),
        },
        other => panic!("expected stack overflow, got {:?}", other),
    }
}

#[test]
fn test_overflow_after_exactly_limit_activations() {
    for limit in &[10usize, 50, 120] {
        let mut vm = Vm::with_config(RealmConfig::default().with_stack_depth_limit(*limit));
        let r = vm.evaluate_program("var n = 0; function f() { n++; f(); } f();", "count.js");
        assert!(matches!(r, Err(VmError::StackOverflow(_))));
        // Global code is the first activation.
        assert_eq!(vm.global("n").unwrap(), num((*limit - 1) as f64));
    }
}

#[test]
fn test_default_limits_overflow_cleanly_on_small_thread() {
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let mut vm = Vm::new();
            let r = vm.evaluate_program(
                "var n = 0; function f() { n++; return f(); } try { f(); } catch (e) {}",
                "default.js",
            );
            let overflowed = matches!(r, Err(VmError::StackOverflow(_)));
            let n = match vm.global("n") {
                Ok(JsValue::Number(n)) => n,
                _ => -1.0,
            };
            let depth = vm.realm().depth();
            // JsValue is !Send; carry only a boolean result across the thread boundary.
            let after = match vm.evaluate_program("n > 0", "after.js") {
                Ok(JsValue::Boolean(b)) => Some(b),
                _ => None,
            };
            (overflowed, n, depth, after)
        })
        .unwrap();
    let (overflowed, n, depth, after) = worker.join().unwrap();
    let after = after.map(JsValue::Boolean);
    assert!(overflowed);
    let limit = RealmConfig::default().stack_depth_limit as f64;
    assert!(n > 0.0 && n < limit);
    assert_eq!(depth, 0);
    assert_eq!(after, Some(JsValue::Boolean(true)));
}

#[test]
fn test_vm_recovers_after_stack_overflow() {
    let mut vm = Vm::with_config(RealmConfig::default().with_stack_depth_limit(30));
    assert!(vm.evaluate_program("function f() { f(); } f();", "a.js").is_err());
    assert_eq!(vm.realm().depth(), 0);
    assert_eq!(vm.evaluate_program("1 + 1", "b.js").unwrap(), num(2.0));
}

#[test]
fn test_error_stack_has_frames() {
    let v = run_js(
        "function thrower() { throw new Error('boom'); } try { thrower(); } catch (e) { e.stack }",
    )
    .unwrap();
    let text = v.to_string();
    assert!(text.starts_with("Error: boom\n    at thrower (test.js:1:"));
    assert!(text.contains("at <global> (test.js:1:"));
}

#[test]
fn test_stack_trace_limit_from_script() {
    let v = run_js(
        "Error.stackTraceLimit = 1; function a() { return b(); } function b() { return new Error('x'); } var s = a().stack; s.indexOf('at a')",
    )
    .unwrap();
    assert_eq!(v, num(-1.0));
}

// ============================================================================
// Scope collapse transparency
// ============================================================================

#[test]
fn test_scope_collapse_is_transparent() {
    let programs = [
        "function f(a, b) { var t = a * b; for (var i = 0; i < 3; i++) t += i; return t; } f(4, 5)",
        "var hits = 0; function g(x) { var y = x + 1; hits += y; if (y > 3) throw y; return y; } var r; try { g(1); g(5); } catch (e) { r = e; } r * 100 + hits",
        "function h() { var arr = []; arr.push(arguments.length); arr.push(arguments[0]); return arr.join('-'); } h('q', 2)",
        "function k(n) { var s = ''; switch (n) { case 1: s = 'one'; break; default: s = 'many'; } return s; } k(1) + k(2)",
    ];
    for program in programs.iter() {
        let collapsed = run_js_with(RealmConfig::default(), program).unwrap();
        let plain = run_js_with(
            RealmConfig::default().with_collapse_environments(false),
            program,
        )
        .unwrap();
        assert_eq!(collapsed, plain, "{}", program);
    }
}
