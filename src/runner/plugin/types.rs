//! Core types for native callbacks.

use std::rc::Rc;

use crate::runner::ds::function_object::create_builtin_function;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::object::{define_final, define_property};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::ValueResult;

/// Function signature for built-in methods.
/// Native functions receive the realm, `this` value, and arguments.
pub type NativeFn = fn(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult;

/// Host callback signature. Unlike `NativeFn` it may capture host state.
pub type HostFn = Rc<dyn Fn(&mut Realm, JsValue, Vec<JsValue>) -> ValueResult>;

/// Built-in function - either compiled-in or provided by the host.
#[derive(Clone)]
pub enum BuiltInFn {
    /// Direct function pointer - zero overhead for compiled-in functions.
    Native(NativeFn),

    /// Host-provided function - small vtable indirection cost.
    Host(HostFn),
}

impl BuiltInFn {
    /// Execute this built-in function.
    pub fn call(&self, realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
        match self {
            BuiltInFn::Native(f) => f(realm, this, args),
            BuiltInFn::Host(f) => f(realm, this, args),
        }
    }
}

/// Positional argument or `undefined`.
pub fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

/// Built-in object definition.
/// Represents a global built-in like `Array`, `Object` or `console`: a constructor (or a plain
/// namespace object when there is none), its static methods, and the methods of its prototype.
pub struct BuiltInObject {
    /// Name of the global binding.
    pub name: &'static str,
    /// Prototype object that receives `methods`, if this object has one.
    pub prototype: Option<JsObjectType>,
    /// Methods defined on the prototype.
    pub methods: Vec<(&'static str, u32, NativeFn)>,
    /// Methods defined on the object itself.
    pub statics: Vec<(&'static str, u32, NativeFn)>,
    /// Data properties defined on the object itself.
    pub properties: Vec<(&'static str, JsValue)>,
    /// `[[Call]]` and `[[Construct]]` behaviour, if this object is a constructor.
    pub constructor: Option<(u32, NativeFn, Option<NativeFn>)>,
}

impl BuiltInObject {
    /// Create a new built-in object with the given name.
    pub fn new(name: &'static str) -> Self {
        BuiltInObject {
            name,
            prototype: None,
            methods: Vec::new(),
            statics: Vec::new(),
            properties: Vec::new(),
            constructor: None,
        }
    }

    /// Set the prototype object shared by instances.
    pub fn with_prototype(mut self, prototype: JsObjectType) -> Self {
        self.prototype = Some(prototype);
        self
    }

    /// Add a prototype method.
    pub fn add_method(mut self, name: &'static str, length: u32, func: NativeFn) -> Self {
        self.methods.push((name, length, func));
        self
    }

    /// Add a method on the object itself.
    pub fn add_static(mut self, name: &'static str, length: u32, func: NativeFn) -> Self {
        self.statics.push((name, length, func));
        self
    }

    /// Add a property.
    pub fn add_property(mut self, name: &'static str, value: JsValue) -> Self {
        self.properties.push((name, value));
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(
        mut self,
        length: u32,
        call: NativeFn,
        construct: Option<NativeFn>,
    ) -> Self {
        self.constructor = Some((length, call, construct));
        self
    }

    /// Materializes the object into `realm` and binds it on the global object.
    pub fn install(self, realm: &Realm) -> JsObjectType {
        let function_prototype = &realm.intrinsics.function_prototype;
        let target = match self.constructor {
            Some((length, call, construct)) => {
                create_builtin_function(function_prototype, self.name, length, call, construct)
            }
            None => realm.new_plain_object(),
        };
        for (name, length, func) in self.statics {
            let f = create_builtin_function(function_prototype, name, length, func, None);
            define_property(&target, name, JsValue::Object(f));
        }
        for (name, value) in self.properties {
            define_property(&target, name, value);
        }
        let method_holder = match &self.prototype {
            Some(proto) => {
                if self.constructor.is_some() {
                    define_final(&target, "prototype", JsValue::Object(proto.clone()));
                    define_property(proto, "constructor", JsValue::Object(target.clone()));
                }
                proto.clone()
            }
            None => target.clone(),
        };
        for (name, length, func) in self.methods {
            let f = create_builtin_function(function_prototype, name, length, func, None);
            define_property(&method_holder, name, JsValue::Object(f));
        }
        define_property(&realm.global_object, self.name, JsValue::Object(target.clone()));
        target
    }
}
