use std::cell::RefCell;
use std::collections::HashMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyDescriptorSetter, PropertyKey};
use crate::runner::ds::operations::object::{
    define_own_property, delete, get, has_property, put,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{EvalError, ValueResult};

pub trait EnvironmentRecord {
    fn has_binding(&self, name: &JsString) -> bool;
    fn create_mutable_binding(
        &self,
        realm: &mut Realm,
        name: JsString,
        can_delete: bool,
    ) -> Result<(), EvalError>;
    fn set_mutable_binding(
        &self,
        realm: &mut Realm,
        name: &JsString,
        value: JsValue,
        strict: bool,
    ) -> Result<(), EvalError>;
    fn get_binding_value(&self, realm: &mut Realm, name: &JsString, strict: bool) -> ValueResult;
    fn delete_binding(&self, realm: &mut Realm, name: &JsString) -> Result<bool, EvalError>;
    fn implicit_this_value(&self) -> JsValue;
}

pub enum EnvironmentRecordType {
    Declarative(DeclarativeEnvironmentRecord),
    Object(ObjectEnvironmentRecord),
}
impl EnvironmentRecordType {
    pub fn as_env_record(&self) -> &dyn EnvironmentRecord {
        match self {
            EnvironmentRecordType::Declarative(d) => d,
            EnvironmentRecordType::Object(d) => d,
        }
    }

    pub fn as_declarative(&self) -> Option<&DeclarativeEnvironmentRecord> {
        match self {
            EnvironmentRecordType::Declarative(d) => Some(d),
            EnvironmentRecordType::Object(_) => None,
        }
    }

    /// Values kept alive by this record, for graph walks.
    pub fn references(&self) -> Vec<JsValue> {
        match self {
            EnvironmentRecordType::Declarative(d) => d
                .bindings
                .borrow()
                .values()
                .map(|b| b.value.clone())
                .collect(),
            EnvironmentRecordType::Object(o) => vec![JsValue::Object(o.bindings.clone())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingState {
    MutableDeletable,
    MutableUndeletable,
    ImmutableUninitialized,
    ImmutableInitialized,
}

struct Binding {
    value: JsValue,
    state: BindingState,
}

pub struct DeclarativeEnvironmentRecord {
    bindings: RefCell<HashMap<JsString, Binding>>,
}
impl DeclarativeEnvironmentRecord {
    pub fn new() -> Self {
        DeclarativeEnvironmentRecord {
            bindings: RefCell::new(HashMap::new()),
        }
    }

    pub fn create_immutable_binding(&self, name: JsString) {
        self.bindings.borrow_mut().entry(name).or_insert(Binding {
            value: JsValue::Undefined,
            state: BindingState::ImmutableUninitialized,
        });
    }

    pub fn initialize_immutable_binding(&self, name: &JsString, value: JsValue) {
        if let Some(b) = self.bindings.borrow_mut().get_mut(name) {
            if b.state == BindingState::ImmutableUninitialized {
                b.value = value;
                b.state = BindingState::ImmutableInitialized;
            }
        }
    }

    pub fn binding_state(&self, name: &JsString) -> Option<BindingState> {
        self.bindings.borrow().get(name).map(|b| b.state)
    }

    /// Reads a binding that is known to exist and be initialized.
    pub fn get_direct(&self, name: &JsString) -> Option<JsValue> {
        self.bindings.borrow().get(name).map(|b| b.value.clone())
    }

    /// Writes a mutable binding that is known to exist. Returns false when there is no such
    /// mutable binding.
    pub fn set_direct(&self, name: &JsString, value: JsValue) -> bool {
        match self.bindings.borrow_mut().get_mut(name) {
            Some(b)
                if b.state == BindingState::MutableDeletable
                    || b.state == BindingState::MutableUndeletable =>
            {
                b.value = value;
                true
            }
            _ => false,
        }
    }
}
impl Default for DeclarativeEnvironmentRecord {
    fn default() -> Self {
        DeclarativeEnvironmentRecord::new()
    }
}
impl EnvironmentRecord for DeclarativeEnvironmentRecord {
    fn has_binding(&self, name: &JsString) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    fn create_mutable_binding(
        &self,
        _realm: &mut Realm,
        name: JsString,
        can_delete: bool,
    ) -> Result<(), EvalError> {
        self.bindings.borrow_mut().entry(name).or_insert(Binding {
            value: JsValue::Undefined,
            state: if can_delete {
                BindingState::MutableDeletable
            } else {
                BindingState::MutableUndeletable
            },
        });
        Ok(())
    }

    fn set_mutable_binding(
        &self,
        realm: &mut Realm,
        name: &JsString,
        value: JsValue,
        strict: bool,
    ) -> Result<(), EvalError> {
        let immutable = {
            let mut bindings = self.bindings.borrow_mut();
            match bindings.get_mut(name) {
                Some(b) => match b.state {
                    BindingState::MutableDeletable | BindingState::MutableUndeletable => {
                        b.value = value;
                        false
                    }
                    _ => true,
                },
                None => false,
            }
        };
        if immutable && strict {
            Err(realm.error(JErrorType::TypeError(format!(
                "Assignment to constant variable '{}'",
                name
            ))))
        } else {
            Ok(())
        }
    }

    fn get_binding_value(&self, realm: &mut Realm, name: &JsString, strict: bool) -> ValueResult {
        let found = self
            .bindings
            .borrow()
            .get(name)
            .map(|b| (b.state, b.value.clone()));
        match found {
            Some((BindingState::ImmutableUninitialized, _)) => {
                if strict {
                    Err(realm.error(JErrorType::ReferenceError(format!(
                        "{} is not initialized",
                        name
                    ))))
                } else {
                    Ok(JsValue::Undefined)
                }
            }
            Some((_, v)) => Ok(v),
            None => Err(realm.error(JErrorType::ReferenceError(format!(
                "{} is not defined",
                name
            )))),
        }
    }

    fn delete_binding(&self, _realm: &mut Realm, name: &JsString) -> Result<bool, EvalError> {
        let mut bindings = self.bindings.borrow_mut();
        match bindings.get(name).map(|b| b.state) {
            None => Ok(true),
            Some(BindingState::MutableDeletable) => {
                bindings.remove(name);
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    fn implicit_this_value(&self) -> JsValue {
        JsValue::Undefined
    }
}

/// Scope backed by an object: the global scope and `with` blocks.
pub struct ObjectEnvironmentRecord {
    pub bindings: JsObjectType,
    pub provide_this: bool,
}
impl ObjectEnvironmentRecord {
    pub fn new(bindings: JsObjectType, provide_this: bool) -> Self {
        ObjectEnvironmentRecord {
            bindings,
            provide_this,
        }
    }
}
impl EnvironmentRecord for ObjectEnvironmentRecord {
    fn has_binding(&self, name: &JsString) -> bool {
        has_property(&self.bindings, &PropertyKey::from_js_string(name))
    }

    fn create_mutable_binding(
        &self,
        realm: &mut Realm,
        name: JsString,
        can_delete: bool,
    ) -> Result<(), EvalError> {
        let desc = PropertyDescriptorSetter::new_from_property_descriptor(
            PropertyDescriptor::new_data(JsValue::Undefined, true, true, can_delete),
        );
        define_own_property(
            realm,
            &self.bindings,
            PropertyKey::from_js_string(&name),
            desc,
            true,
        )?;
        Ok(())
    }

    fn set_mutable_binding(
        &self,
        realm: &mut Realm,
        name: &JsString,
        value: JsValue,
        strict: bool,
    ) -> Result<(), EvalError> {
        put(
            realm,
            &self.bindings,
            &PropertyKey::from_js_string(name),
            value,
            strict,
        )
    }

    fn get_binding_value(&self, realm: &mut Realm, name: &JsString, strict: bool) -> ValueResult {
        let key = PropertyKey::from_js_string(name);
        if !has_property(&self.bindings, &key) {
            return if strict {
                Err(realm.error(JErrorType::ReferenceError(format!(
                    "{} is not defined",
                    name
                ))))
            } else {
                Ok(JsValue::Undefined)
            };
        }
        get(realm, &self.bindings, &key)
    }

    fn delete_binding(&self, realm: &mut Realm, name: &JsString) -> Result<bool, EvalError> {
        delete(realm, &self.bindings, &PropertyKey::from_js_string(name), false)
    }

    fn implicit_this_value(&self) -> JsValue {
        if self.provide_this {
            JsValue::Object(self.bindings.clone())
        } else {
            JsValue::Undefined
        }
    }
}
