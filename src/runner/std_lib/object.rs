//! Object built-in.
//!
//! Provides the Object constructor, its reflective statics and the methods every object
//! inherits from `Object.prototype`.

use std::rc::Rc;

use crate::runner::ds::array_object::create_array;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyDescriptorSetter, PropertyKey};
use crate::runner::ds::operations::object::{
    define_free, define_own_property, enumerate, get, get_own_property, has_property,
    own_property_keys,
};
use crate::runner::ds::operations::type_conversion::{
    get_type, to_boolean, to_object, to_property_key,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, BuiltInObject};

/// Register the Object built-in on the global object.
pub fn register(realm: &mut Realm) {
    BuiltInObject::new("Object")
        .with_prototype(realm.intrinsics.object_prototype.clone())
        .with_constructor(1, object_constructor, Some(object_constructor))
        .add_static("getPrototypeOf", 1, object_get_prototype_of)
        .add_static("getOwnPropertyDescriptor", 2, object_get_own_property_descriptor)
        .add_static("getOwnPropertyNames", 1, object_get_own_property_names)
        .add_static("keys", 1, object_keys)
        .add_static("create", 2, object_create)
        .add_static("defineProperty", 3, object_define_property)
        .add_static("defineProperties", 2, object_define_properties)
        .add_static("preventExtensions", 1, object_prevent_extensions)
        .add_static("isExtensible", 1, object_is_extensible)
        .add_static("freeze", 1, object_freeze)
        .add_static("isFrozen", 1, object_is_frozen)
        .add_static("seal", 1, object_seal)
        .add_static("isSealed", 1, object_is_sealed)
        .add_method("toString", 0, object_to_string)
        .add_method("valueOf", 0, object_value_of)
        .add_method("hasOwnProperty", 1, object_has_own_property)
        .add_method("isPrototypeOf", 1, object_is_prototype_of)
        .add_method("propertyIsEnumerable", 1, object_property_is_enumerable)
        .install(realm);
}

/// The first argument as an object, or a TypeError naming the calling method.
fn object_arg(realm: &mut Realm, args: &[JsValue], method: &str) -> Result<JsObjectType, EvalError> {
    match arg(args, 0) {
        JsValue::Object(o) => Ok(o),
        other => Err(realm.error(JErrorType::TypeError(format!(
            "Object.{} called on non-object ({})",
            method,
            get_type(&other)
        )))),
    }
}

fn field(realm: &mut Realm, o: &JsObjectType, name: &str) -> Result<Option<JsValue>, EvalError> {
    let key = PropertyKey::from_str(name);
    if has_property(o, &key) {
        Ok(Some(get(realm, o, &key)?))
    } else {
        Ok(None)
    }
}

fn accessor_function(
    realm: &mut Realm,
    v: JsValue,
    which: &str,
) -> Result<Option<JsObjectType>, EvalError> {
    match v {
        JsValue::Undefined => Ok(None),
        JsValue::Object(o) if o.borrow().is_callable() => Ok(Some(o)),
        other => Err(realm.error(JErrorType::TypeError(format!(
            "Property descriptor {} must be a function: {}",
            which,
            get_type(&other)
        )))),
    }
}

/// ToPropertyDescriptor: reads a descriptor object into a setter that honours only the fields
/// present on it.
pub fn to_property_descriptor(
    realm: &mut Realm,
    v: &JsValue,
) -> Result<PropertyDescriptorSetter, EvalError> {
    let o = match v {
        JsValue::Object(o) => o.clone(),
        other => {
            return Err(realm.error(JErrorType::TypeError(format!(
                "Property description must be an object: {}",
                get_type(other)
            ))))
        }
    };
    let mut desc = PropertyDescriptorSetter::new_generic();
    if let Some(e) = field(realm, &o, "enumerable")? {
        desc = desc.with_enumerable(to_boolean(&e));
    }
    if let Some(c) = field(realm, &o, "configurable")? {
        desc = desc.with_configurable(to_boolean(&c));
    }
    if let Some(value) = field(realm, &o, "value")? {
        desc = desc.with_value(value);
    }
    if let Some(w) = field(realm, &o, "writable")? {
        desc = desc.with_writable(to_boolean(&w));
    }
    let getter = field(realm, &o, "get")?;
    let setter = field(realm, &o, "set")?;
    if (getter.is_some() || setter.is_some()) && desc.is_data_descriptor() {
        return Err(realm.error(JErrorType::TypeError(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute"
                .to_string(),
        )));
    }
    if let Some(g) = getter {
        let g = accessor_function(realm, g, "getter")?;
        desc = desc.with_get(g);
    }
    if let Some(s) = setter {
        let s = accessor_function(realm, s, "setter")?;
        desc = desc.with_set(s);
    }
    Ok(desc)
}

/// FromPropertyDescriptor.
pub fn from_property_descriptor(realm: &Realm, desc: &PropertyDescriptor) -> JsObjectType {
    let o = realm.new_plain_object();
    let function_or_undefined =
        |f: Option<JsObjectType>| f.map_or(JsValue::Undefined, JsValue::Object);
    match desc {
        PropertyDescriptor::Data {
            value, writable, ..
        } => {
            define_free(&o, "value", value.clone());
            define_free(&o, "writable", JsValue::Boolean(*writable));
        }
        PropertyDescriptor::Accessor { get, set, .. } => {
            define_free(&o, "get", function_or_undefined(get.clone()));
            define_free(&o, "set", function_or_undefined(set.clone()));
        }
    }
    define_free(&o, "enumerable", JsValue::Boolean(desc.is_enumerable()));
    define_free(&o, "configurable", JsValue::Boolean(desc.is_configurable()));
    o
}

fn object_constructor(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    match arg(&args, 0) {
        JsValue::Undefined | JsValue::Null => Ok(JsValue::Object(realm.new_plain_object())),
        v => Ok(JsValue::Object(to_object(realm, &v)?)),
    }
}

fn object_get_prototype_of(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "getPrototypeOf")?;
    let proto = o.borrow().get_prototype_of();
    Ok(proto.map_or(JsValue::Null, JsValue::Object))
}

fn object_get_own_property_descriptor(
    realm: &mut Realm,
    _this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let o = object_arg(realm, &args, "getOwnPropertyDescriptor")?;
    let key = to_property_key(realm, &arg(&args, 1))?;
    Ok(match get_own_property(&o, &key) {
        Some(desc) => JsValue::Object(from_property_descriptor(realm, &desc)),
        None => JsValue::Undefined,
    })
}

fn object_get_own_property_names(
    realm: &mut Realm,
    _this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let o = object_arg(realm, &args, "getOwnPropertyNames")?;
    let names = own_property_keys(&o)
        .iter()
        .map(|k| JsValue::String(k.to_js_string()))
        .collect();
    Ok(JsValue::Object(create_array(realm, names)))
}

fn object_keys(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "keys")?;
    let names = enumerate(&o, true, true)
        .map(|k| JsValue::String(k.to_js_string()))
        .collect();
    Ok(JsValue::Object(create_array(realm, names)))
}

fn define_properties(realm: &mut Realm, o: &JsObjectType, properties: &JsValue) -> Result<(), EvalError> {
    let props = to_object(realm, properties)?;
    let mut descriptors = vec![];
    for key in enumerate(&props, true, true).collect::<Vec<_>>() {
        let desc_obj = get(realm, &props, &key)?;
        descriptors.push((key, to_property_descriptor(realm, &desc_obj)?));
    }
    for (key, desc) in descriptors {
        define_own_property(realm, o, key, desc, true)?;
    }
    Ok(())
}

fn object_create(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let proto = match arg(&args, 0) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(realm.error(JErrorType::TypeError(format!(
                "Object prototype may only be an Object or null: {}",
                get_type(&other)
            ))))
        }
    };
    let o = new_object(ObjectKind::Ordinary, proto);
    let properties = arg(&args, 1);
    if !properties.is_undefined() {
        define_properties(realm, &o, &properties)?;
    }
    Ok(JsValue::Object(o))
}

fn object_define_property(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "defineProperty")?;
    let key = to_property_key(realm, &arg(&args, 1))?;
    let desc = to_property_descriptor(realm, &arg(&args, 2))?;
    define_own_property(realm, &o, key, desc, true)?;
    Ok(JsValue::Object(o))
}

fn object_define_properties(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "defineProperties")?;
    define_properties(realm, &o, &arg(&args, 1))?;
    Ok(JsValue::Object(o))
}

fn object_prevent_extensions(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "preventExtensions")?;
    o.borrow_mut().base.prevent_extensions();
    Ok(JsValue::Object(o))
}

fn object_is_extensible(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "isExtensible")?;
    let extensible = o.borrow().base.is_extensible();
    Ok(JsValue::Boolean(extensible))
}

/// Makes every own property non-configurable, and also read-only when `freeze` is set.
fn lock_properties(realm: &mut Realm, o: &JsObjectType, freeze: bool) -> Result<(), EvalError> {
    for key in own_property_keys(o) {
        let current = match get_own_property(o, &key) {
            Some(d) => d,
            None => continue,
        };
        let mut desc = PropertyDescriptorSetter::new_generic().with_configurable(false);
        if freeze && current.is_data_descriptor() {
            desc = desc.with_writable(false);
        }
        define_own_property(realm, o, key, desc, true)?;
    }
    o.borrow_mut().base.prevent_extensions();
    Ok(())
}

/// True when the object is not extensible and every own property passes `locked`.
fn all_locked(o: &JsObjectType, locked: impl Fn(&PropertyDescriptor) -> bool) -> bool {
    if o.borrow().base.is_extensible() {
        return false;
    }
    own_property_keys(o)
        .iter()
        .filter_map(|k| get_own_property(o, k))
        .all(|d| locked(&d))
}

fn object_freeze(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "freeze")?;
    lock_properties(realm, &o, true)?;
    Ok(JsValue::Object(o))
}

fn object_seal(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "seal")?;
    lock_properties(realm, &o, false)?;
    Ok(JsValue::Object(o))
}

fn object_is_frozen(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "isFrozen")?;
    Ok(JsValue::Boolean(all_locked(&o, |d| {
        !d.is_configurable() && !(d.is_data_descriptor() && d.is_writable())
    })))
}

fn object_is_sealed(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = object_arg(realm, &args, "isSealed")?;
    Ok(JsValue::Boolean(all_locked(&o, |d| !d.is_configurable())))
}

/// Object.prototype.toString
fn object_to_string(_realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let tag = match &this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Object(o) => o.borrow().class_name(),
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

fn object_value_of(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Object(to_object(realm, &this)?))
}

fn object_has_own_property(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let key = to_property_key(realm, &arg(&args, 0))?;
    let o = to_object(realm, &this)?;
    Ok(JsValue::Boolean(get_own_property(&o, &key).is_some()))
}

fn object_is_prototype_of(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let v = match arg(&args, 0) {
        JsValue::Object(v) => v,
        _ => return Ok(JsValue::Boolean(false)),
    };
    let o = to_object(realm, &this)?;
    let mut current = v.borrow().get_prototype_of();
    while let Some(p) = current {
        if Rc::ptr_eq(&p, &o) {
            return Ok(JsValue::Boolean(true));
        }
        current = p.borrow().get_prototype_of();
    }
    Ok(JsValue::Boolean(false))
}

fn object_property_is_enumerable(
    realm: &mut Realm,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let key = to_property_key(realm, &arg(&args, 0))?;
    let o = to_object(realm, &this)?;
    let enumerable = get_own_property(&o, &key).map_or(false, |d| d.is_enumerable());
    Ok(JsValue::Boolean(enumerable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_descriptor_rejects_mixed_fields() {
        let mut realm = Realm::new(RealmConfig::default());
        let o = realm.new_plain_object();
        define_free(&o, "value", JsValue::Number(1.0));
        define_free(&o, "get", JsValue::Undefined);
        assert!(to_property_descriptor(&mut realm, &JsValue::Object(o)).is_err());
    }

    #[test]
    fn test_descriptor_round_trip_keeps_attributes() {
        let mut realm = Realm::new(RealmConfig::default());
        let desc = PropertyDescriptor::new_data(JsValue::Number(7.0), false, true, false);
        let o = from_property_descriptor(&realm, &desc);
        let setter = to_property_descriptor(&mut realm, &JsValue::Object(o)).unwrap();
        assert!(setter.honour_value && setter.honour_writable);
        assert_eq!(setter.descriptor.value(), JsValue::Number(7.0));
        assert!(setter.descriptor.is_enumerable());
        assert!(!setter.descriptor.is_configurable());
    }

    #[test]
    fn test_freeze_locks_every_property() {
        let mut realm = Realm::new(RealmConfig::default());
        let o = realm.new_plain_object();
        define_free(&o, "a", JsValue::Number(1.0));
        let args = vec![JsValue::Object(o.clone())];
        assert_eq!(
            object_is_frozen(&mut realm, JsValue::Undefined, args.clone()).unwrap(),
            JsValue::Boolean(false)
        );
        object_freeze(&mut realm, JsValue::Undefined, args.clone()).unwrap();
        assert_eq!(
            object_is_frozen(&mut realm, JsValue::Undefined, args.clone()).unwrap(),
            JsValue::Boolean(true)
        );
        assert_eq!(
            object_is_sealed(&mut realm, JsValue::Undefined, args).unwrap(),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn test_to_string_uses_class() {
        let mut realm = Realm::new(RealmConfig::default());
        let v = object_to_string(&mut realm, JsValue::Null, vec![]).unwrap();
        assert_eq!(v, JsValue::from_str("[object Null]"));
        let a = JsValue::Object(create_array(&realm, vec![]));
        let v = object_to_string(&mut realm, a, vec![]).unwrap();
        assert_eq!(v, JsValue::from_str("[object Array]"));
    }
}
