//! Console built-in object.
//!
//! Provides console.log and console.error.

use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::BuiltInObject;

/// Register the console object on the global object.
pub fn register(realm: &mut Realm) {
    BuiltInObject::new("console")
        .add_method("log", 0, console_log)
        .add_method("error", 0, console_error)
        .install(realm);
}

/// Format all arguments for console output, separated by spaces.
fn format_args(realm: &mut Realm, args: &[JsValue]) -> Result<String, EvalError> {
    let mut parts = Vec::with_capacity(args.len());
    for a in args {
        parts.push(to_string(realm, a)?.to_string());
    }
    Ok(parts.join(" "))
}

/// console.log - Log to stdout.
fn console_log(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    println!("{}", format_args(realm, &args)?);
    Ok(JsValue::Undefined)
}

/// console.error - Log to stderr.
fn console_error(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    eprintln!("{}", format_args(realm, &args)?);
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_format_args() {
        let mut realm = Realm::new(RealmConfig::default());
        let s = format_args(
            &mut realm,
            &[JsValue::Number(1.5), JsValue::Null, JsValue::from_str("x")],
        )
        .unwrap();
        assert_eq!(s, "1.5 null x");
    }
}
