use std::collections::HashMap;

use crate::runner::ds::execution_context::LocalFrame;
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{
    PropertyDescriptor, PropertyDescriptorSetter, PropertyKey,
};
use crate::runner::ds::operations::object::{
    define_accessor, define_free, define_property, get_own_property,
    ordinary_define_own_property, reject,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::EvalError;

/// Where a formal parameter lives during an activation.
#[derive(Clone)]
pub enum MappedBinding {
    /// A local slot of the activation frame.
    Slot(LocalFrame, usize),
    /// A binding in the function's declarative environment.
    Environment(JsLexEnvironmentType, JsString),
}
impl MappedBinding {
    fn read(&self) -> JsValue {
        match self {
            MappedBinding::Slot(frame, i) => frame
                .borrow()
                .get(*i)
                .cloned()
                .unwrap_or(JsValue::Undefined),
            MappedBinding::Environment(env, name) => env
                .inner
                .as_declarative()
                .and_then(|d| d.get_direct(name))
                .unwrap_or(JsValue::Undefined),
        }
    }

    fn write(&self, value: JsValue) {
        match self {
            MappedBinding::Slot(frame, i) => {
                if let Some(s) = frame.borrow_mut().get_mut(*i) {
                    *s = value;
                }
            }
            MappedBinding::Environment(env, name) => {
                if let Some(d) = env.inner.as_declarative() {
                    d.set_direct(name, value);
                }
            }
        }
    }
}

/// Indices of a non-strict arguments object that alias formal parameters.
#[derive(Default)]
pub struct ArgumentsMap {
    mapped: HashMap<u32, MappedBinding>,
}
impl ArgumentsMap {
    pub fn is_mapped(&self, property: &PropertyKey) -> bool {
        property
            .as_index()
            .map_or(false, |i| self.mapped.contains_key(&i))
    }

    pub fn mapped_value(&self, property: &PropertyKey) -> Option<JsValue> {
        let i = property.as_index()?;
        self.mapped.get(&i).map(MappedBinding::read)
    }

    fn write(&self, property: &PropertyKey, value: JsValue) {
        if let Some(b) = property.as_index().and_then(|i| self.mapped.get(&i)) {
            b.write(value);
        }
    }

    pub fn unmap(&mut self, property: &PropertyKey) {
        if let Some(i) = property.as_index() {
            self.mapped.remove(&i);
        }
    }

    pub fn references(&self) -> Vec<JsValue> {
        self.mapped.values().map(MappedBinding::read).collect()
    }
}

/// Builds the arguments object of an activation. `params` pairs each formal parameter name with
/// its storage; non-strict activations alias every index below both the argument count and the
/// parameter count, the last occurrence of a duplicated name winning.
pub fn create_arguments_object(
    realm: &Realm,
    func: &JsObjectType,
    args: &[JsValue],
    params: &[(JsString, MappedBinding)],
    strict: bool,
) -> JsObjectType {
    let o = new_object(
        ObjectKind::Arguments(ArgumentsMap::default()),
        Some(realm.intrinsics.object_prototype.clone()),
    );
    define_property(&o, "length", JsValue::Number(args.len() as f64));
    let mut mapped_names: Vec<&JsString> = vec![];
    let mut mapped = HashMap::new();
    for index in (0..args.len()).rev() {
        define_free(&o, &index.to_string(), args[index].clone());
        if strict {
            continue;
        }
        if let Some((name, binding)) = params.get(index) {
            if !mapped_names.contains(&name) {
                mapped_names.push(name);
                mapped.insert(index as u32, binding.clone());
            }
        }
    }
    if strict {
        let thrower = realm.intrinsics.throw_type_error.clone();
        define_accessor(&o, "caller", Some(thrower.clone()), Some(thrower.clone()));
        define_accessor(&o, "callee", Some(thrower.clone()), Some(thrower));
    } else {
        define_property(&o, "callee", JsValue::Object(func.clone()));
        if let ObjectKind::Arguments(map) = &mut o.borrow_mut().kind {
            map.mapped = mapped;
        }
    }
    o
}

/// `[[DefineOwnProperty]]` of arguments objects: accessors and `writable: false` break the
/// alias, values are written through to the aliased parameter.
pub fn arguments_define_own_property(
    realm: &mut Realm,
    o: &JsObjectType,
    property: PropertyKey,
    mut desc: PropertyDescriptorSetter,
    throw: bool,
) -> Result<bool, EvalError> {
    let is_mapped = match &o.borrow().kind {
        ObjectKind::Arguments(map) => map.is_mapped(&property),
        _ => false,
    };
    if is_mapped
        && desc.is_data_descriptor()
        && !desc.honour_value
        && desc.honour_writable
        && !desc.descriptor.is_writable()
    {
        if let Some(PropertyDescriptor::Data { value, .. }) = get_own_property(o, &property) {
            desc = desc.with_value(value);
        }
    }
    if !ordinary_define_own_property(realm, o, property.clone(), desc.clone(), false)? {
        return reject(realm, throw, &property);
    }
    if is_mapped {
        if let ObjectKind::Arguments(map) = &mut o.borrow_mut().kind {
            if desc.is_accessor_descriptor() {
                map.unmap(&property);
            } else {
                if desc.honour_value {
                    map.write(&property, desc.descriptor.value());
                }
                if desc.honour_writable && !desc.descriptor.is_writable() {
                    map.unmap(&property);
                }
            }
        }
    }
    Ok(true)
}
