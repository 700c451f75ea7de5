use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::arguments_object::ArgumentsMap;
use crate::runner::ds::execution_context::StackFrame;
use crate::runner::ds::function_object::FunctionKind;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::value::{JsString, JsValue};

pub type JsObjectType = Rc<RefCell<JsObject>>;

/// Selects the behaviour of the property protocol and of `[[Call]]`/`[[Construct]]`.
pub enum ObjectKind {
    Ordinary,
    Array,
    Function(FunctionKind),
    Arguments(ArgumentsMap),
    Error(Vec<StackFrame>),
    Boolean(bool),
    Number(f64),
    String(JsString),
}

struct PropertySlot {
    order: u64,
    descriptor: PropertyDescriptor,
}

pub struct ObjectBase {
    properties: HashMap<PropertyKey, PropertySlot>,
    next_order: u64,
    is_extensible: bool,
    prototype: Option<JsObjectType>,
}
impl ObjectBase {
    pub fn new(prototype: Option<JsObjectType>) -> Self {
        ObjectBase {
            properties: HashMap::new(),
            next_order: 0,
            is_extensible: true,
            prototype,
        }
    }

    pub fn get_own_property(&self, property: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(property).map(|s| &s.descriptor)
    }

    pub fn get_own_property_mut(
        &mut self,
        property: &PropertyKey,
    ) -> Option<&mut PropertyDescriptor> {
        self.properties.get_mut(property).map(|s| &mut s.descriptor)
    }

    pub fn has_own_property(&self, property: &PropertyKey) -> bool {
        self.properties.contains_key(property)
    }

    /// Inserts or replaces a descriptor without any validation. A replaced property keeps its
    /// enumeration position.
    pub fn insert_property(&mut self, property: PropertyKey, descriptor: PropertyDescriptor) {
        if let Some(slot) = self.properties.get_mut(&property) {
            slot.descriptor = descriptor;
            return;
        }
        let order = self.next_order;
        self.next_order += 1;
        self.properties
            .insert(property, PropertySlot { order, descriptor });
    }

    pub fn remove_property(&mut self, property: &PropertyKey) -> Option<PropertyDescriptor> {
        self.properties.remove(property).map(|s| s.descriptor)
    }

    /// Own keys with canonical array indices first in ascending order, then every other key in
    /// the order it was first added.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices = vec![];
        let mut names = vec![];
        for (k, slot) in &self.properties {
            match k {
                PropertyKey::Index(i) => indices.push(*i),
                PropertyKey::Str(_) => names.push((slot.order, k.clone())),
            }
        }
        indices.sort_unstable();
        names.sort_unstable_by_key(|(order, _)| *order);
        indices
            .into_iter()
            .map(PropertyKey::Index)
            .chain(names.into_iter().map(|(_, k)| k))
            .collect()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn get_prototype_of(&self) -> Option<JsObjectType> {
        self.prototype.clone()
    }

    pub fn is_extensible(&self) -> bool {
        self.is_extensible
    }

    pub fn prevent_extensions(&mut self) {
        self.is_extensible = false;
    }

    pub(crate) fn descriptors(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values().map(|s| &s.descriptor)
    }
}

pub struct JsObject {
    pub base: ObjectBase,
    pub kind: ObjectKind,
}
impl JsObject {
    pub fn new(kind: ObjectKind, prototype: Option<JsObjectType>) -> Self {
        JsObject {
            base: ObjectBase::new(prototype),
            kind,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Error(_) => "Error",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    pub fn get_prototype_of(&self) -> Option<JsObjectType> {
        self.base.get_prototype_of()
    }

    /// The primitive wrapped by a Boolean, Number or String object.
    pub fn primitive_value(&self) -> Option<JsValue> {
        match &self.kind {
            ObjectKind::Boolean(b) => Some(JsValue::Boolean(*b)),
            ObjectKind::Number(n) => Some(JsValue::Number(*n)),
            ObjectKind::String(s) => Some(JsValue::String(s.clone())),
            _ => None,
        }
    }

    /// Every value directly reachable from this object: prototype, property values and
    /// accessors, and whatever the kind keeps internally.
    pub fn references(&self) -> Vec<JsValue> {
        let mut refs = vec![];
        if let Some(p) = &self.base.prototype {
            refs.push(JsValue::Object(p.clone()));
        }
        for d in self.base.descriptors() {
            refs.extend(d.references());
        }
        match &self.kind {
            ObjectKind::Function(f) => refs.extend(f.references()),
            ObjectKind::Arguments(m) => refs.extend(m.references()),
            ObjectKind::Error(frames) => {
                refs.extend(
                    frames
                        .iter()
                        .filter_map(|f| f.function.clone())
                        .map(JsValue::Object),
                );
            }
            _ => {}
        }
        refs
    }
}

pub fn new_object(kind: ObjectKind, prototype: Option<JsObjectType>) -> JsObjectType {
    Rc::new(RefCell::new(JsObject::new(kind, prototype)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object_property::PropertyDescriptor;

    #[test]
    fn test_own_keys_order() {
        let mut base = ObjectBase::new(None);
        let d = || PropertyDescriptor::new_data(JsValue::Undefined, true, true, true);
        base.insert_property(PropertyKey::from_str("b"), d());
        base.insert_property(PropertyKey::from_str("10"), d());
        base.insert_property(PropertyKey::from_str("a"), d());
        base.insert_property(PropertyKey::from_str("2"), d());
        base.insert_property(PropertyKey::from_str("b"), d());
        let keys: Vec<String> = base.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2", "10", "b", "a"]);
    }
}
