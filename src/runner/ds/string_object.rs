use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::operations::object::define_final;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{utf16_len, utf16_unit_at, JsString, JsValue};

/// Wraps a string primitive. `length` is a real own property; the indexed characters are
/// synthesized on lookup by `string_own_index`.
pub fn create_string_object(realm: &Realm, s: JsString) -> JsObjectType {
    let len = utf16_len(&s);
    let o = new_object(
        ObjectKind::String(s),
        Some(realm.intrinsics.string_prototype.clone()),
    );
    define_final(&o, "length", JsValue::Number(len as f64));
    o
}

/// Read-only enumerable descriptor of the character at a canonical index of `s`.
pub fn string_own_index(s: &str, property: &PropertyKey) -> Option<PropertyDescriptor> {
    let index = property.as_index()?;
    let unit = utf16_unit_at(s, index as usize)?;
    Some(PropertyDescriptor::new_data(
        JsValue::from(String::from_utf16_lossy(&[unit])),
        false,
        true,
        false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_index_descriptor() {
        let d = string_own_index("héllo", &PropertyKey::Index(1)).unwrap();
        assert_eq!(d.value(), JsValue::from_str("é"));
        assert!(!d.is_writable());
        assert!(d.is_enumerable());
        assert!(string_own_index("abc", &PropertyKey::Index(3)).is_none());
        assert!(string_own_index("abc", &PropertyKey::from_str("x")).is_none());
    }
}
