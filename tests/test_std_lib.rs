//! Tests for standard library built-in objects.
//!
//! These tests exercise Object, Function, Array, String, Number, Boolean and the error
//! constructors from script.

extern crate clove;

use clove::runner::api::Vm;
use clove::runner::ds::value::JsValue;

fn run_js(code: &str) -> JsValue {
    match Vm::new().evaluate_program(code, "std_lib.js") {
        Ok(v) => v,
        Err(e) => panic!("{} failed: {}", code, e),
    }
}

fn throws(code: &str) -> bool {
    Vm::new().evaluate_program(code, "std_lib.js").is_err()
}

fn string(s: &str) -> JsValue {
    JsValue::from_str(s)
}

// ============================================================================
// Global functions
// ============================================================================

mod global_tests {
    use super::*;

    #[test]
    fn test_value_properties_are_read_only() {
        assert_eq!(run_js("NaN = 1; typeof NaN"), string("number"));
        assert_eq!(run_js("undefined = 1; typeof undefined"), string("undefined"));
        assert!(throws("'use strict'; Infinity = 1;"));
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(run_js("parseInt('  -17abc')"), JsValue::Number(-17.0));
        assert_eq!(run_js("parseInt('ff', 16)"), JsValue::Number(255.0));
        assert_eq!(run_js("parseFloat('2.5e1x')"), JsValue::Number(25.0));
        assert_eq!(run_js("isNaN(parseInt('x'))"), JsValue::Boolean(true));
        assert_eq!(run_js("isFinite('12')"), JsValue::Boolean(true));
        assert_eq!(run_js("isFinite(1 / 0)"), JsValue::Boolean(false));
    }

    #[test]
    fn test_global_refers_to_global_object() {
        assert_eq!(run_js("var x = 4; global.x"), JsValue::Number(4.0));
    }

    #[test]
    fn test_system_properties() {
        assert_eq!(
            run_js("setSystemProperty('stackTraceLimit', 3); getSystemProperty('stackTraceLimit')"),
            JsValue::Number(3.0)
        );
        assert_eq!(run_js("getSystemProperty('stepsLimit')"), JsValue::Undefined);
        assert_eq!(run_js("getSystemProperty('nothing')"), JsValue::Undefined);
    }

    #[test]
    fn test_system_handlers() {
        assert_eq!(
            run_js("setSystemHandler('h', function () { return 1; }); getSystemHandler('h')()"),
            JsValue::Number(1.0)
        );
        assert_eq!(
            run_js("setSystemHandler('h', function () {}); removeSystemHandler('h'); typeof getSystemHandler('h')"),
            string("undefined")
        );
        assert!(throws("setSystemHandler('h', 5)"));
    }
}

// ============================================================================
// Object
// ============================================================================

mod object_tests {
    use super::*;

    #[test]
    fn test_define_property_defaults() {
        let code = "var o = {}; Object.defineProperty(o, 'a', {value: 1}); var d = Object.getOwnPropertyDescriptor(o, 'a'); [d.value, d.writable, d.enumerable, d.configurable].join()";
        assert_eq!(run_js(code), string("1,false,false,false"));
    }

    #[test]
    fn test_redefining_frozen_property_rejected() {
        let setup = "var o = {}; Object.defineProperty(o, 'a', {value: 1, writable: false, configurable: false});";
        assert!(throws(&format!("{} Object.defineProperty(o, 'a', {{value: 2}});", setup)));
        assert_eq!(
            run_js(&format!("{} Object.defineProperty(o, 'a', {{value: 1}}); o.a", setup)),
            JsValue::Number(1.0)
        );
        assert_eq!(run_js(&format!("{} o.a = 5; o.a", setup)), JsValue::Number(1.0));
        assert!(throws(&format!("'use strict'; {} o.a = 5;", setup)));
    }

    #[test]
    fn test_same_value_distinguishes_zeroes() {
        let setup = "var o = {}; Object.defineProperty(o, 'z', {value: 0});";
        assert!(throws(&format!("{} Object.defineProperty(o, 'z', {{value: -0}});", setup)));
        assert_eq!(
            run_js("var o = {}; Object.defineProperty(o, 'n', {value: NaN}); Object.defineProperty(o, 'n', {value: NaN}); isNaN(o.n)"),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn test_accessor_descriptors() {
        let code = "var o = {}; var store = 0; Object.defineProperty(o, 'v', {get: function () { return store; }, set: function (x) { store = x + 1; }}); o.v = 4; o.v";
        assert_eq!(run_js(code), JsValue::Number(5.0));
        assert!(throws("Object.defineProperty({}, 'v', {get: 1})"));
        assert!(throws("Object.defineProperty({}, 'v', {get: function () {}, value: 1})"));
    }

    #[test]
    fn test_keys_and_names() {
        assert_eq!(run_js("Object.keys({b: 1, a: 2}).join()"), string("b,a"));
        assert_eq!(
            run_js("var o = {x: 1}; Object.defineProperty(o, 'hidden', {value: 2}); Object.getOwnPropertyNames(o).join()"),
            string("x,hidden")
        );
        assert_eq!(run_js("Object.keys([7, 8]).join()"), string("0,1"));
    }

    #[test]
    fn test_create_and_prototypes() {
        assert_eq!(
            run_js("var p = {greet: 'hi'}; var o = Object.create(p); o.greet + (Object.getPrototypeOf(o) === p)"),
            string("hitrue")
        );
        assert_eq!(run_js("Object.getPrototypeOf(Object.create(null))"), JsValue::Null);
        assert_eq!(
            run_js("var o = Object.create({}, {a: {value: 3, enumerable: true}}); o.a"),
            JsValue::Number(3.0)
        );
        assert_eq!(
            run_js("var p = {}; Object.create(p); p.isPrototypeOf(Object.create(p))"),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn test_freeze_seal_and_extensibility() {
        assert_eq!(
            run_js("var o = Object.freeze({a: 1}); o.a = 2; o.b = 3; o.a + (o.b === undefined ? 10 : 0)"),
            JsValue::Number(11.0)
        );
        assert_eq!(run_js("Object.isFrozen(Object.freeze({a: 1}))"), JsValue::Boolean(true));
        assert_eq!(run_js("Object.isSealed(Object.seal({a: 1}))"), JsValue::Boolean(true));
        assert_eq!(run_js("Object.isFrozen(Object.seal({a: 1}))"), JsValue::Boolean(false));
        assert_eq!(
            run_js("var o = Object.preventExtensions({}); o.x = 1; Object.isExtensible(o) + '' + o.x"),
            string("falseundefined")
        );
        assert!(throws("'use strict'; var o = Object.preventExtensions({}); o.x = 1;"));
    }

    #[test]
    fn test_prototype_methods() {
        assert_eq!(run_js("({}).toString()"), string("[object Object]"));
        assert_eq!(run_js("Object.prototype.toString.call([])"), string("[object Array]"));
        assert_eq!(run_js("({a: 1}).hasOwnProperty('a')"), JsValue::Boolean(true));
        assert_eq!(run_js("({}).hasOwnProperty('toString')"), JsValue::Boolean(false));
        assert_eq!(run_js("[1].propertyIsEnumerable('length')"), JsValue::Boolean(false));
        assert_eq!(run_js("typeof Object(1)"), string("object"));
    }
}

// ============================================================================
// Function
// ============================================================================

mod function_tests {
    use super::*;

    #[test]
    fn test_call_apply_bind() {
        assert_eq!(
            run_js("function f(a, b) { return this.x + a + b; } f.call({x: 1}, 2, 3)"),
            JsValue::Number(6.0)
        );
        assert_eq!(
            run_js("function f(a, b) { return this.x + a + b; } f.apply({x: 1}, [2, 3])"),
            JsValue::Number(6.0)
        );
        assert_eq!(
            run_js("function f(a, b) { return this.x + a + b; } var g = f.bind({x: 1}, 2); g(3) + g.length"),
            JsValue::Number(7.0)
        );
    }

    #[test]
    fn test_function_constructor() {
        assert_eq!(run_js("new Function('a', 'b', 'return a + b')(2, 3)"), JsValue::Number(5.0));
        assert_eq!(run_js("Function('return typeof this')()"), string("object"));
        assert!(throws("Function('return (')"));
    }

    #[test]
    fn test_to_string_returns_source() {
        assert_eq!(
            run_js("function add(a, b) { return a + b; } add.toString()"),
            string("function add(a, b) { return a + b; }")
        );
    }

    #[test]
    fn test_strict_function_poison_pills() {
        assert!(throws("function f() { 'use strict'; } f.caller"));
        assert!(throws("function f() { 'use strict'; } f.arguments = 1"));
    }

    #[test]
    fn test_length_and_prototype() {
        assert_eq!(run_js("(function (a, b, c) {}).length"), JsValue::Number(3.0));
        assert_eq!(
            run_js("function F() {} F.prototype.constructor === F"),
            JsValue::Boolean(true)
        );
    }
}

// ============================================================================
// Array
// ============================================================================

mod array_tests {
    use super::*;

    #[test]
    fn test_length_tracks_indices() {
        assert_eq!(run_js("var a = []; a[4] = 1; a.length"), JsValue::Number(5.0));
        assert_eq!(run_js("var a = [1, 2, 3]; a.length = 1; a.join()"), string("1"));
        assert_eq!(run_js("var a = [1, 2, 3]; a.length = 1; a[2]"), JsValue::Undefined);
        assert!(throws("[].length = -1"));
    }

    #[test]
    fn test_constructor_and_is_array() {
        assert_eq!(run_js("new Array(3).length"), JsValue::Number(3.0));
        assert_eq!(run_js("Array(1, 2).join('+')"), string("1+2"));
        assert_eq!(run_js("Array.isArray([]) && !Array.isArray({})"), JsValue::Boolean(true));
    }

    #[test]
    fn test_methods() {
        assert_eq!(run_js("var a = [1]; a.push(2, 3); a.pop() + a.length"), JsValue::Number(5.0));
        assert_eq!(run_js("[1, 2, 3, 4].slice(1, -1).join()"), string("2,3"));
        assert_eq!(run_js("[1, 2, 3].indexOf(3)"), JsValue::Number(2.0));
        assert_eq!(run_js("String([1, [2, 3]])"), string("1,2,3"));
        assert_eq!(run_js("[,1].length"), JsValue::Number(2.0));
    }
}

// ============================================================================
// String, Number and Boolean
// ============================================================================

mod primitive_wrapper_tests {
    use super::*;

    #[test]
    fn test_string_methods() {
        assert_eq!(run_js("'hello'.charAt(1)"), string("e"));
        assert_eq!(run_js("'hello'.charCodeAt(0)"), JsValue::Number(104.0));
        assert_eq!(run_js("'hello'.indexOf('llo')"), JsValue::Number(2.0));
        assert_eq!(run_js("'hello'.slice(-3, -1)"), string("ll"));
        assert_eq!(run_js("'hello'.substring(3, 1)"), string("el"));
    }

    #[test]
    fn test_string_wrapper_objects() {
        assert_eq!(run_js("typeof new String('a')"), string("object"));
        assert_eq!(run_js("new String('abc').length"), JsValue::Number(3.0));
        assert_eq!(run_js("var s = new String('ab'); s[0] = 'z'; s[0]"), string("a"));
        assert_eq!(run_js("Object.keys(new String('ab')).join()"), string("0,1"));
        assert!(throws("String.prototype.toString.call({})"));
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(run_js("(255).toString(16)"), string("ff"));
        assert_eq!(run_js("(-0.5).toString(2)"), string("-0.1"));
        assert_eq!(run_js("new Number(4).valueOf() + 1"), JsValue::Number(5.0));
        assert_eq!(run_js("Number('  42  ')"), JsValue::Number(42.0));
        assert_eq!(run_js("Number()"), JsValue::Number(0.0));
        assert!(throws("(1).toString(40)"));
    }

    #[test]
    fn test_boolean_wrappers() {
        assert_eq!(run_js("new Boolean(false) ? 'yes' : 'no'"), string("yes"));
        assert_eq!(run_js("Boolean('') + ''"), string("false"));
        assert_eq!(run_js("new Boolean(true).toString()"), string("true"));
    }
}

// ============================================================================
// Errors
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        assert_eq!(run_js("new TypeError('bad').toString()"), string("TypeError: bad"));
        assert_eq!(run_js("Error('plain').message"), string("plain"));
        assert_eq!(run_js("new RangeError() instanceof Error"), JsValue::Boolean(true));
        assert_eq!(run_js("new URIError('u').name"), string("URIError"));
        assert_eq!(run_js("new Error().toString()"), string("Error"));
    }

    #[test]
    fn test_runtime_errors_have_native_prototypes() {
        assert_eq!(
            run_js("try { null.x; } catch (e) { e instanceof TypeError }"),
            JsValue::Boolean(true)
        );
        assert_eq!(
            run_js("try { nope; } catch (e) { e.name }"),
            string("ReferenceError")
        );
        assert_eq!(
            run_js("try { eval('a b'); } catch (e) { e instanceof SyntaxError }"),
            JsValue::Boolean(true)
        );
    }
}
