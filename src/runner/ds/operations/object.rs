use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::runner::ds::arguments_object;
use crate::runner::ds::array_object;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{call, is_strict_function};
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{
    PropertyDescriptor, PropertyDescriptorSetter, PropertyKey,
};
use crate::runner::ds::operations::test_and_comparison::same_value;
use crate::runner::ds::operations::type_conversion::{to_object, PreferredType};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::string_object;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};

/// `[[GetOwnProperty]]`. The descriptor is copied out so no borrow outlives the call.
pub fn get_own_property(o: &JsObjectType, property: &PropertyKey) -> Option<PropertyDescriptor> {
    let obj = o.borrow();
    match &obj.kind {
        ObjectKind::Arguments(map) => {
            let desc = obj.base.get_own_property(property).cloned();
            match (desc, map.mapped_value(property)) {
                (Some(PropertyDescriptor::Data {
                    writable,
                    enumerable,
                    configurable,
                    ..
                }), Some(value)) => Some(PropertyDescriptor::Data {
                    value,
                    writable,
                    enumerable,
                    configurable,
                }),
                (desc, _) => desc,
            }
        }
        ObjectKind::String(s) => match obj.base.get_own_property(property) {
            Some(d) => Some(d.clone()),
            None => string_object::string_own_index(s, property),
        },
        _ => obj.base.get_own_property(property).cloned(),
    }
}

/// `[[GetProperty]]`: own property or the nearest one up the prototype chain.
pub fn get_property(o: &JsObjectType, property: &PropertyKey) -> Option<PropertyDescriptor> {
    let mut current = Some(o.clone());
    while let Some(obj) = current {
        if let Some(d) = get_own_property(&obj, property) {
            return Some(d);
        }
        current = obj.borrow().get_prototype_of();
    }
    None
}

pub fn has_property(o: &JsObjectType, property: &PropertyKey) -> bool {
    get_property(o, property).is_some()
}

pub fn has_own_property(o: &JsObjectType, property: &PropertyKey) -> bool {
    get_own_property(o, property).is_some()
}

/// `[[Get]]`.
pub fn get(realm: &mut Realm, o: &JsObjectType, property: &PropertyKey) -> ValueResult {
    let mapped = match &o.borrow().kind {
        ObjectKind::Arguments(map) => map.mapped_value(property),
        _ => None,
    };
    if let Some(v) = mapped {
        return Ok(v);
    }
    let v = get_with_receiver(realm, o, property, &JsValue::Object(o.clone()))?;
    if property.is("caller") && is_strict_function(&v) {
        let is_fn_or_args = matches!(
            o.borrow().kind,
            ObjectKind::Function(_) | ObjectKind::Arguments(_)
        );
        if is_fn_or_args {
            return Err(realm.error(JErrorType::TypeError(
                "'caller' of a strict mode function cannot be accessed".to_string(),
            )));
        }
    }
    Ok(v)
}

fn get_with_receiver(
    realm: &mut Realm,
    o: &JsObjectType,
    property: &PropertyKey,
    receiver: &JsValue,
) -> ValueResult {
    match get_property(o, property) {
        None => Ok(JsValue::Undefined),
        Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
        Some(PropertyDescriptor::Accessor { get, .. }) => match get {
            None => Ok(JsValue::Undefined),
            Some(getter) => call(realm, &JsValue::Object(getter), receiver.clone(), vec![]),
        },
    }
}

/// `[[Get]]` on any base value. Primitives read through their wrapper prototype, and getters
/// see the primitive itself as `this`.
pub fn get_v(realm: &mut Realm, base: &JsValue, property: &PropertyKey) -> ValueResult {
    match base {
        JsValue::Object(o) => get(realm, o, property),
        JsValue::String(s) => {
            if property.is("length") {
                return Ok(JsValue::Number(crate::runner::ds::value::utf16_len(s) as f64));
            }
            if let Some(d) = string_object::string_own_index(s, property) {
                return Ok(d.value());
            }
            let proto = realm.intrinsics.string_prototype.clone();
            get_with_receiver(realm, &proto, property, base)
        }
        JsValue::Number(_) => {
            let proto = realm.intrinsics.number_prototype.clone();
            get_with_receiver(realm, &proto, property, base)
        }
        JsValue::Boolean(_) => {
            let proto = realm.intrinsics.boolean_prototype.clone();
            get_with_receiver(realm, &proto, property, base)
        }
        JsValue::Undefined | JsValue::Null => Err(realm.error(JErrorType::TypeError(format!(
            "Cannot read property '{}' of {}",
            property, base
        )))),
    }
}

/// `[[CanPut]]`.
pub fn can_put(o: &JsObjectType, property: &PropertyKey) -> bool {
    if let Some(desc) = get_own_property(o, property) {
        return match desc {
            PropertyDescriptor::Accessor { set, .. } => set.is_some(),
            PropertyDescriptor::Data { writable, .. } => writable,
        };
    }
    let (proto, extensible) = {
        let obj = o.borrow();
        (obj.get_prototype_of(), obj.base.is_extensible())
    };
    let proto = match proto {
        None => return extensible,
        Some(p) => p,
    };
    match get_property(&proto, property) {
        None => extensible,
        Some(PropertyDescriptor::Accessor { set, .. }) => set.is_some(),
        Some(PropertyDescriptor::Data { writable, .. }) => extensible && writable,
    }
}

fn read_only_error(realm: &mut Realm, property: &PropertyKey) -> EvalError {
    realm.error(JErrorType::TypeError(format!(
        "Cannot assign to read only property '{}'",
        property
    )))
}

/// `[[Put]]`.
pub fn put(
    realm: &mut Realm,
    o: &JsObjectType,
    property: &PropertyKey,
    value: JsValue,
    throw: bool,
) -> Result<(), EvalError> {
    if let Some(PropertyDescriptor::Data { writable: true, .. }) = get_own_property(o, property) {
        define_own_property(
            realm,
            o,
            property.clone(),
            PropertyDescriptorSetter::new_value(value),
            throw,
        )?;
        return Ok(());
    }
    if !can_put(o, property) {
        return if throw {
            Err(read_only_error(realm, property))
        } else {
            Ok(())
        };
    }
    match get_property(o, property) {
        Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
            call(
                realm,
                &JsValue::Object(setter),
                JsValue::Object(o.clone()),
                vec![value],
            )?;
            Ok(())
        }
        _ => {
            define_own_property(
                realm,
                o,
                property.clone(),
                PropertyDescriptorSetter::new_from_property_descriptor(
                    PropertyDescriptor::new_data(value, true, true, true),
                ),
                throw,
            )?;
            Ok(())
        }
    }
}

/// `[[Put]]` on a primitive base: never creates a property, throws in strict code when the
/// write would be lost.
pub fn put_v(
    realm: &mut Realm,
    base: &JsValue,
    property: &PropertyKey,
    value: JsValue,
    strict: bool,
) -> Result<(), EvalError> {
    if let JsValue::Object(o) = base {
        return put(realm, o, property, value, strict);
    }
    let o = to_object(realm, base)?;
    if !can_put(&o, property) {
        return if strict {
            Err(read_only_error(realm, property))
        } else {
            Ok(())
        };
    }
    if let Some(PropertyDescriptor::Data { .. }) = get_own_property(&o, property) {
        return if strict {
            Err(read_only_error(realm, property))
        } else {
            Ok(())
        };
    }
    if let Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) = get_property(&o, property)
    {
        call(realm, &JsValue::Object(setter), base.clone(), vec![value])?;
        return Ok(());
    }
    if strict {
        Err(realm.error(JErrorType::TypeError(format!(
            "Cannot create property '{}' on {}",
            property, base
        ))))
    } else {
        Ok(())
    }
}

/// `[[Delete]]`.
pub fn delete(
    realm: &mut Realm,
    o: &JsObjectType,
    property: &PropertyKey,
    throw: bool,
) -> Result<bool, EvalError> {
    let desc = match get_own_property(o, property) {
        None => return Ok(true),
        Some(d) => d,
    };
    if desc.is_configurable() {
        let mut obj = o.borrow_mut();
        obj.base.remove_property(property);
        if let ObjectKind::Arguments(map) = &mut obj.kind {
            map.unmap(property);
        }
        Ok(true)
    } else if throw {
        Err(realm.error(JErrorType::TypeError(format!(
            "Cannot delete property '{}'",
            property
        ))))
    } else {
        Ok(false)
    }
}

pub(crate) fn reject(
    realm: &mut Realm,
    throw: bool,
    property: &PropertyKey,
) -> Result<bool, EvalError> {
    if throw {
        Err(realm.error(JErrorType::TypeError(format!(
            "Cannot redefine property: {}",
            property
        ))))
    } else {
        Ok(false)
    }
}

/// `[[DefineOwnProperty]]`, the only path that changes the shape of an existing descriptor.
pub fn define_own_property(
    realm: &mut Realm,
    o: &JsObjectType,
    property: PropertyKey,
    desc: PropertyDescriptorSetter,
    throw: bool,
) -> Result<bool, EvalError> {
    let kind = match &o.borrow().kind {
        ObjectKind::Array => 1,
        ObjectKind::Arguments(_) => 2,
        _ => 0,
    };
    match kind {
        1 => array_object::array_define_own_property(realm, o, property, desc, throw),
        2 => arguments_object::arguments_define_own_property(realm, o, property, desc, throw),
        _ => ordinary_define_own_property(realm, o, property, desc, throw),
    }
}

pub fn ordinary_define_own_property(
    realm: &mut Realm,
    o: &JsObjectType,
    property: PropertyKey,
    desc: PropertyDescriptorSetter,
    throw: bool,
) -> Result<bool, EvalError> {
    let current = get_own_property(o, &property);
    let current = match current {
        None => {
            if !o.borrow().base.is_extensible() {
                return reject(realm, throw, &property);
            }
            o.borrow_mut().base.insert_property(
                property,
                PropertyDescriptor::new_from_property_descriptor_setter(desc),
            );
            return Ok(true);
        }
        Some(c) => c,
    };
    if desc.is_empty() || desc.is_subset_of(&current) {
        return Ok(true);
    }
    if !current.is_configurable() {
        if desc.honour_configurable && desc.descriptor.is_configurable() {
            return reject(realm, throw, &property);
        }
        if desc.honour_enumerable && desc.descriptor.is_enumerable() != current.is_enumerable() {
            return reject(realm, throw, &property);
        }
    }
    if !desc.is_generic_descriptor() {
        if current.is_data_descriptor() != desc.is_data_descriptor() {
            if !current.is_configurable() {
                return reject(realm, throw, &property);
            }
        } else if current.is_data_descriptor() {
            if !current.is_configurable() && !current.is_writable() {
                if desc.honour_writable && desc.descriptor.is_writable() {
                    return reject(realm, throw, &property);
                }
                if desc.honour_value && !same_value(&desc.descriptor.value(), &current.value()) {
                    return reject(realm, throw, &property);
                }
            }
        } else if !current.is_configurable() {
            let same = |a: Option<JsObjectType>, b: Option<JsObjectType>| match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
                _ => false,
            };
            if desc.honour_set && !same(desc.descriptor.setter(), current.setter()) {
                return reject(realm, throw, &property);
            }
            if desc.honour_get && !same(desc.descriptor.getter(), current.getter()) {
                return reject(realm, throw, &property);
            }
        }
    }
    let mut obj = o.borrow_mut();
    if let Some(stored) = obj.base.get_own_property_mut(&property) {
        stored.apply(&desc);
    }
    Ok(true)
}

/// `[[DefaultValue]]`.
pub fn default_value(realm: &mut Realm, o: &JsObjectType, hint: PreferredType) -> ValueResult {
    let order = match hint {
        PreferredType::String => ["toString", "valueOf"],
        PreferredType::Number | PreferredType::Default => ["valueOf", "toString"],
    };
    for name in order.iter() {
        let f = get(realm, o, &PropertyKey::from_str(name))?;
        if is_callable(&f) {
            let v = call(realm, &f, JsValue::Object(o.clone()), vec![])?;
            if !v.is_object() {
                return Ok(v);
            }
        }
    }
    Err(realm.error(JErrorType::TypeError(
        "Cannot convert object to primitive value".to_string(),
    )))
}

pub fn is_callable(v: &JsValue) -> bool {
    match v {
        JsValue::Object(o) => o.borrow().is_callable(),
        _ => false,
    }
}

/// Own keys including the virtual indices of String objects.
pub fn own_property_keys(o: &JsObjectType) -> Vec<PropertyKey> {
    let obj = o.borrow();
    match &obj.kind {
        ObjectKind::String(s) => {
            let len = crate::runner::ds::value::utf16_len(s) as u32;
            let mut keys: Vec<PropertyKey> = (0..len).map(PropertyKey::Index).collect();
            keys.extend(obj.base.own_keys());
            keys
        }
        _ => obj.base.own_keys(),
    }
}

/// Lazy property-name enumeration. Each name is re-checked for presence when it is reached, so
/// names deleted before being visited are skipped, and names shadowed by an object visited
/// earlier in the chain are reported once.
pub struct PropertyEnumerator {
    current: Option<JsObjectType>,
    pending: VecDeque<PropertyKey>,
    seen: HashSet<PropertyKey>,
    own_only: bool,
    enumerable_only: bool,
}
impl PropertyEnumerator {
    pub fn next_key(&mut self) -> Option<PropertyKey> {
        loop {
            let current = self.current.clone()?;
            match self.pending.pop_front() {
                Some(key) => {
                    if self.seen.contains(&key) {
                        continue;
                    }
                    let desc = match get_own_property(&current, &key) {
                        Some(d) => d,
                        None => continue,
                    };
                    self.seen.insert(key.clone());
                    if !self.enumerable_only || desc.is_enumerable() {
                        return Some(key);
                    }
                }
                None => {
                    if self.own_only {
                        self.current = None;
                        return None;
                    }
                    let next = current.borrow().get_prototype_of();
                    if let Some(n) = &next {
                        self.pending = own_property_keys(n).into_iter().collect();
                    }
                    self.current = next;
                }
            }
        }
    }
}
impl Iterator for PropertyEnumerator {
    type Item = PropertyKey;

    fn next(&mut self) -> Option<PropertyKey> {
        self.next_key()
    }
}

pub fn enumerate(o: &JsObjectType, own_only: bool, enumerable_only: bool) -> PropertyEnumerator {
    PropertyEnumerator {
        current: Some(o.clone()),
        pending: own_property_keys(o).into_iter().collect(),
        seen: HashSet::new(),
        own_only,
        enumerable_only,
    }
}

fn insert(o: &JsObjectType, name: &str, desc: PropertyDescriptor) {
    o.borrow_mut()
        .base
        .insert_property(PropertyKey::from_str(name), desc);
}

/// Writable, configurable, not enumerable. The shape of builtin methods.
pub fn define_property(o: &JsObjectType, name: &str, value: JsValue) {
    insert(o, name, PropertyDescriptor::new_data(value, true, false, true));
}

/// Read-only, permanent and hidden.
pub fn define_final(o: &JsObjectType, name: &str, value: JsValue) {
    insert(o, name, PropertyDescriptor::new_data(value, false, false, false));
}

/// Writable, enumerable and configurable. The shape of properties created by assignment.
pub fn define_free(o: &JsObjectType, name: &str, value: JsValue) {
    insert(o, name, PropertyDescriptor::new_data(value, true, true, true));
}

/// Writable but hidden and permanent.
pub fn define_writable(o: &JsObjectType, name: &str, value: JsValue) {
    insert(o, name, PropertyDescriptor::new_data(value, true, false, false));
}

pub fn define_accessor(
    o: &JsObjectType,
    name: &str,
    get: Option<JsObjectType>,
    set: Option<JsObjectType>,
) {
    insert(
        o,
        name,
        PropertyDescriptor::Accessor {
            get,
            set,
            enumerable: false,
            configurable: false,
        },
    );
}

/// `o[name](args)`, failing with a TypeError when the property is not callable.
pub fn invoke(
    realm: &mut Realm,
    o: &JsObjectType,
    name: &str,
    args: Vec<JsValue>,
) -> ValueResult {
    let f = get(realm, o, &PropertyKey::from_str(name))?;
    if !is_callable(&f) {
        return Err(realm.error(JErrorType::TypeError(format!("{} is not a function", name))));
    }
    call(realm, &f, JsValue::Object(o.clone()), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::new_object;
    use crate::runner::ds::realm::RealmConfig;

    fn new_realm() -> Realm {
        Realm::new(RealmConfig::default())
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let mut realm = new_realm();
        let o = realm.new_plain_object();
        let key = PropertyKey::from_str("x");
        put(&mut realm, &o, &key, JsValue::Number(7.0), true).unwrap();
        assert_eq!(get(&mut realm, &o, &key).unwrap(), JsValue::Number(7.0));
        let key = PropertyKey::from_str("3");
        put(&mut realm, &o, &key, JsValue::from_str("v"), true).unwrap();
        assert_eq!(get(&mut realm, &o, &key).unwrap(), JsValue::from_str("v"));
    }

    #[test]
    fn test_non_configurable_rejection() {
        let mut realm = new_realm();
        let o = realm.new_plain_object();
        let key = PropertyKey::from_str("k");
        let frozen = PropertyDescriptorSetter::new_from_property_descriptor(
            PropertyDescriptor::new_data(JsValue::Number(1.0), false, false, false),
        );
        assert!(define_own_property(&mut realm, &o, key.clone(), frozen, true).unwrap());
        let same = PropertyDescriptorSetter::new_generic().with_value(JsValue::Number(1.0));
        assert!(define_own_property(&mut realm, &o, key.clone(), same, true).unwrap());
        let other = PropertyDescriptorSetter::new_generic().with_value(JsValue::Number(2.0));
        assert!(!define_own_property(&mut realm, &o, key.clone(), other.clone(), false).unwrap());
        assert!(define_own_property(&mut realm, &o, key.clone(), other, true).is_err());
        let widen = PropertyDescriptorSetter::new_generic().with_configurable(true);
        assert!(!define_own_property(&mut realm, &o, key.clone(), widen, false).unwrap());
        let to_accessor = PropertyDescriptorSetter::new_generic().with_get(None);
        assert!(!define_own_property(&mut realm, &o, key, to_accessor, false).unwrap());
    }

    #[test]
    fn test_non_extensible_rejects_new_properties() {
        let mut realm = new_realm();
        let o = realm.new_plain_object();
        o.borrow_mut().base.prevent_extensions();
        let key = PropertyKey::from_str("fresh");
        put(&mut realm, &o, &key, JsValue::Null, false).unwrap();
        assert!(!has_own_property(&o, &key));
        assert!(put(&mut realm, &o, &key, JsValue::Null, true).is_err());
    }

    #[test]
    fn test_enumeration_skips_deleted_and_shadowed() {
        let mut realm = new_realm();
        let proto = realm.new_plain_object();
        define_free(&proto, "a", JsValue::Null);
        define_free(&proto, "z", JsValue::Null);
        let o = new_object(ObjectKind::Ordinary, Some(proto.clone()));
        define_free(&o, "b", JsValue::Null);
        define_property(&o, "z", JsValue::Null);
        define_free(&o, "1", JsValue::Null);
        let mut e = enumerate(&o, false, true);
        assert_eq!(e.next_key(), Some(PropertyKey::Index(1)));
        delete(&mut realm, &proto, &PropertyKey::from_str("a"), false).unwrap();
        let rest: Vec<String> = e.map(|k| k.to_string()).collect();
        assert_eq!(rest, vec!["b"]);
    }
}
