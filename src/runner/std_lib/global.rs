//! Value properties and functions of the global object, and the hooks script uses to talk to
//! the host.

use std::rc::Rc;

use crate::runner::compiler::declaration::perform_eval;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{create_builtin_function, create_custom_function};
use crate::runner::ds::operations::object::{
    define_final, define_free, define_property, is_callable,
};
use crate::runner::ds::operations::type_conversion::{
    is_js_whitespace, to_int32, to_number, to_string,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::{arg, NativeFn};

pub const STEPS_LIMIT: &str = "stepsLimit";
pub const STACK_DEPTH_LIMIT: &str = "stackDepthLimit";
pub const STACK_TRACE_LIMIT: &str = "stackTraceLimit";

pub fn register(realm: &mut Realm) {
    let global = realm.global_object.clone();
    define_final(&global, "NaN", JsValue::Number(f64::NAN));
    define_final(&global, "Infinity", JsValue::Number(f64::INFINITY));
    define_final(&global, "undefined", JsValue::Undefined);
    define_final(&global, "global", JsValue::Object(global.clone()));
    define_property(
        &global,
        "eval",
        JsValue::Object(realm.intrinsics.eval_function.clone()),
    );

    let functions: [(&'static str, u32, NativeFn); 10] = [
        ("isNaN", 1, is_nan),
        ("isFinite", 1, is_finite),
        ("parseInt", 2, parse_int),
        ("parseFloat", 1, parse_float),
        ("setSystemProperty", 2, set_system_property),
        ("getSystemProperty", 1, get_system_property),
        ("setSystemHandler", 2, set_system_handler),
        ("getSystemHandler", 1, get_system_handler),
        ("removeSystemHandler", 1, remove_system_handler),
        ("CustomFunction", 1, custom_function),
    ];
    let function_prototype = realm.intrinsics.function_prototype.clone();
    for (name, length, f) in functions.iter() {
        let construct = if *name == "CustomFunction" { Some(*f) } else { None };
        let fo = create_builtin_function(&function_prototype, name, *length, *f, construct);
        define_property(&global, name, JsValue::Object(fo));
    }
}

/// `eval` reached through anything but a direct call.
pub fn indirect_eval(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    perform_eval(realm, arg(&args, 0), None)
}

fn is_nan(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Boolean(to_number(realm, &arg(&args, 0))?.is_nan()))
}

fn is_finite(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Boolean(to_number(realm, &arg(&args, 0))?.is_finite()))
}

fn parse_int(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let input = to_string(realm, &arg(&args, 0))?;
    let mut radix = to_int32(realm, &arg(&args, 1))?;
    let s = input.trim_start_matches(is_js_whitespace);
    let (sign, s) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let mut strip_prefix = true;
    if radix != 0 {
        if radix < 2 || radix > 36 {
            return Ok(JsValue::Number(f64::NAN));
        }
        if radix != 16 {
            strip_prefix = false;
        }
    } else {
        radix = 10;
    }
    let mut digits = s;
    if strip_prefix && (s.starts_with("0x") || s.starts_with("0X")) {
        digits = &s[2..];
        radix = 16;
    }
    let radix = radix as u32;
    let mut value = 0.0;
    let mut any = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * f64::from(radix) + f64::from(d);
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(sign * value))
}

/// Length of the longest prefix of `s` that is a `StrDecimalLiteral`.
fn decimal_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return i + "Infinity".len();
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa = i > int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if mantissa || j > frac_start {
            mantissa = true;
            i = j;
        }
    }
    if !mantissa {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

fn parse_float(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let input = to_string(realm, &arg(&args, 0))?;
    let s = input.trim_start_matches(is_js_whitespace);
    let prefix = &s[..decimal_prefix_len(s)];
    let n = match prefix.trim_start_matches(|c| c == '+' || c == '-') {
        "" => f64::NAN,
        "Infinity" => f64::INFINITY,
        digits => digits.parse::<f64>().unwrap_or(f64::NAN),
    };
    Ok(JsValue::Number(if prefix.starts_with('-') { -n } else { n }))
}

fn limit_from(n: f64) -> Option<f64> {
    if n.is_finite() && n > 0.0 {
        Some(n.trunc())
    } else {
        None
    }
}

fn set_system_property(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    let value = arg(&args, 1);
    match &*name {
        STEPS_LIMIT => {
            let n = to_number(realm, &value)?;
            realm.config.steps_limit = limit_from(n).map(|n| n as u64);
            realm.reset_steps();
        }
        STACK_DEPTH_LIMIT => {
            let n = to_number(realm, &value)?;
            if let Some(n) = limit_from(n) {
                realm.config.stack_depth_limit = n as usize;
            }
        }
        STACK_TRACE_LIMIT => {
            let n = to_number(realm, &value)?;
            if n.is_finite() && n >= 0.0 {
                realm.config.stack_trace_limit = n as usize;
                let error_constructor = realm.intrinsics.error_constructor.clone();
                define_free(&error_constructor, STACK_TRACE_LIMIT, JsValue::Number(n.trunc()));
            }
        }
        _ => {}
    }
    Ok(JsValue::Undefined)
}

fn get_system_property(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    Ok(match &*name {
        STEPS_LIMIT => realm
            .config
            .steps_limit
            .map_or(JsValue::Undefined, |n| JsValue::Number(n as f64)),
        STACK_DEPTH_LIMIT => JsValue::Number(realm.config.stack_depth_limit as f64),
        STACK_TRACE_LIMIT => JsValue::Number(realm.stack_trace_limit() as f64),
        _ => JsValue::Undefined,
    })
}

fn set_system_handler(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    let handler = arg(&args, 1);
    if !is_callable(&handler) {
        return Err(realm.error(JErrorType::TypeError(format!(
            "System handler '{}' must be a function",
            name
        ))));
    }
    realm.system_handlers.insert(name, handler);
    Ok(JsValue::Undefined)
}

fn get_system_handler(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    Ok(realm
        .system_handlers
        .get(&name)
        .cloned()
        .unwrap_or(JsValue::Undefined))
}

fn remove_system_handler(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    Ok(JsValue::Boolean(realm.system_handlers.remove(&name).is_some()))
}

/// `CustomFunction(name)`: a callable that forwards to the host callback registered under
/// `name` at the time it is called.
fn custom_function(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let name = to_string(realm, &arg(&args, 0))?;
    Ok(JsValue::Object(create_custom_function(realm, Rc::clone(&name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    fn call(f: NativeFn, args: Vec<JsValue>) -> JsValue {
        let mut realm = Realm::new(RealmConfig::default());
        f(&mut realm, JsValue::Undefined, args).unwrap()
    }

    #[test]
    fn test_parse_int() {
        let n = |s: &str, radix: Option<f64>| {
            let mut args = vec![JsValue::from_str(s)];
            if let Some(r) = radix {
                args.push(JsValue::Number(r));
            }
            call(parse_int, args)
        };
        assert_eq!(n("  42px", None), JsValue::Number(42.0));
        assert_eq!(n("-0x1F", None), JsValue::Number(-31.0));
        assert_eq!(n("0x1F", Some(10.0)), JsValue::Number(0.0));
        assert_eq!(n("z", Some(36.0)), JsValue::Number(35.0));
        assert!(matches!(n("", None), JsValue::Number(v) if v.is_nan()));
        assert!(matches!(n("10", Some(1.0)), JsValue::Number(v) if v.is_nan()));
    }

    #[test]
    fn test_parse_float() {
        let n = |s: &str| call(parse_float, vec![JsValue::from_str(s)]);
        assert_eq!(n(" 3.25e2abc"), JsValue::Number(325.0));
        assert_eq!(n("-.5"), JsValue::Number(-0.5));
        assert_eq!(n("1e"), JsValue::Number(1.0));
        assert_eq!(n("-Infinityx"), JsValue::Number(f64::NEG_INFINITY));
        assert!(matches!(n("."), JsValue::Number(v) if v.is_nan()));
    }

    #[test]
    fn test_system_properties() {
        let mut realm = Realm::new(RealmConfig::default());
        set_system_property(
            &mut realm,
            JsValue::Undefined,
            vec![JsValue::from_str(STEPS_LIMIT), JsValue::Number(50.0)],
        )
        .unwrap();
        assert_eq!(realm.config.steps_limit, Some(50));
        let v = get_system_property(
            &mut realm,
            JsValue::Undefined,
            vec![JsValue::from_str(STACK_DEPTH_LIMIT)],
        )
        .unwrap();
        assert_eq!(v, JsValue::Number(200.0));
    }
}
