use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{
    PropertyDescriptor, PropertyDescriptorSetter, PropertyKey,
};
use crate::runner::ds::operations::object::{
    define_free, define_writable, delete, get_own_property, ordinary_define_own_property, reject,
};
use crate::runner::ds::operations::type_conversion::{number_to_uint32, to_number};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalError;

const ARRAY_LENGTH_PROP: &str = "length";

pub fn create_array(realm: &Realm, values: Vec<JsValue>) -> JsObjectType {
    let o = new_object(
        ObjectKind::Array,
        Some(realm.intrinsics.array_prototype.clone()),
    );
    define_writable(&o, ARRAY_LENGTH_PROP, JsValue::Number(values.len() as f64));
    for (i, v) in values.into_iter().enumerate() {
        define_free(&o, &i.to_string(), v);
    }
    o
}

fn length_descriptor(o: &JsObjectType) -> (u32, bool) {
    match get_own_property(o, &PropertyKey::from_str(ARRAY_LENGTH_PROP)) {
        Some(PropertyDescriptor::Data {
            value: JsValue::Number(n),
            writable,
            ..
        }) => (n as u32, writable),
        _ => (0, true),
    }
}

pub fn array_length(o: &JsObjectType) -> u32 {
    length_descriptor(o).0
}

/// `[[DefineOwnProperty]]` of Array objects: keeps `length` above every index and deletes
/// trailing elements when `length` shrinks.
pub fn array_define_own_property(
    realm: &mut Realm,
    o: &JsObjectType,
    property: PropertyKey,
    desc: PropertyDescriptorSetter,
    throw: bool,
) -> Result<bool, EvalError> {
    let (old_len, len_writable) = length_descriptor(o);
    if property.is(ARRAY_LENGTH_PROP) {
        if !desc.honour_value {
            return ordinary_define_own_property(realm, o, property, desc, throw);
        }
        let number = to_number(realm, &desc.descriptor.value())?;
        let new_len = number_to_uint32(number);
        if f64::from(new_len) != number {
            return Err(realm.error(JErrorType::RangeError("Invalid array length".to_string())));
        }
        let mut new_len_desc = desc.with_value(JsValue::Number(f64::from(new_len)));
        if new_len >= old_len {
            return ordinary_define_own_property(realm, o, property, new_len_desc, throw);
        }
        if !len_writable {
            return reject(realm, throw, &property);
        }
        let new_writable = !(new_len_desc.honour_writable && !new_len_desc.descriptor.is_writable());
        if !new_writable {
            new_len_desc = new_len_desc.with_writable(true);
        }
        if !ordinary_define_own_property(realm, o, property.clone(), new_len_desc.clone(), throw)? {
            return Ok(false);
        }
        let mut doomed: Vec<u32> = o
            .borrow()
            .base
            .own_keys()
            .iter()
            .filter_map(PropertyKey::as_index)
            .filter(|i| *i >= new_len)
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for index in doomed {
            if !delete(realm, o, &PropertyKey::Index(index), false)? {
                let mut stuck = new_len_desc.with_value(JsValue::Number(f64::from(index) + 1.0));
                if !new_writable {
                    stuck = stuck.with_writable(false);
                }
                ordinary_define_own_property(realm, o, property.clone(), stuck, false)?;
                return reject(realm, throw, &property);
            }
        }
        if !new_writable {
            ordinary_define_own_property(
                realm,
                o,
                property,
                PropertyDescriptorSetter::new_generic().with_writable(false),
                false,
            )?;
        }
        return Ok(true);
    }
    if let Some(index) = property.as_index() {
        if index >= old_len && !len_writable {
            return reject(realm, throw, &property);
        }
        if !ordinary_define_own_property(realm, o, property.clone(), desc, false)? {
            return reject(realm, throw, &property);
        }
        if index >= old_len {
            if let Some(PropertyDescriptor::Data { value, .. }) = o
                .borrow_mut()
                .base
                .get_own_property_mut(&PropertyKey::from_str(ARRAY_LENGTH_PROP))
            {
                *value = JsValue::Number(f64::from(index) + 1.0);
            }
        }
        return Ok(true);
    }
    ordinary_define_own_property(realm, o, property, desc, throw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::operations::object::{get, has_own_property, put};
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_index_write_grows_length() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = create_array(&realm, vec![JsValue::Number(1.0)]);
        put(&mut realm, &a, &PropertyKey::Index(4), JsValue::Null, true).unwrap();
        assert_eq!(array_length(&a), 5);
    }

    #[test]
    fn test_length_shrink_deletes_elements() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = create_array(
            &realm,
            vec![JsValue::Number(1.0), JsValue::Number(2.0), JsValue::Number(3.0)],
        );
        let len = PropertyKey::from_str("length");
        put(&mut realm, &a, &len, JsValue::Number(1.0), true).unwrap();
        assert_eq!(get(&mut realm, &a, &len).unwrap(), JsValue::Number(1.0));
        assert!(has_own_property(&a, &PropertyKey::Index(0)));
        assert!(!has_own_property(&a, &PropertyKey::Index(2)));
        assert!(put(&mut realm, &a, &len, JsValue::Number(1.5), true).is_err());
    }
}
