use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::operations::test_and_comparison::same_value;
use crate::runner::ds::value::{JsString, JsValue};

/// Own-property key. Canonical array indices (`"0"` .. `"4294967294"`) are kept numeric so that
/// integer-indexed objects can intercept them and enumeration can order them.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PropertyKey {
    Str(JsString),
    Index(u32),
}
impl PropertyKey {
    pub fn from_str(s: &str) -> Self {
        match canonical_array_index(s) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::Str(Rc::from(s)),
        }
    }

    pub fn from_js_string(s: &JsString) -> Self {
        match canonical_array_index(s) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::Str(s.clone()),
        }
    }

    pub fn from_index(i: u32) -> Self {
        if i == u32::MAX {
            PropertyKey::Str(Rc::from(i.to_string()))
        } else {
            PropertyKey::Index(i)
        }
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::Str(_) => None,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        match self {
            PropertyKey::Str(s) => &**s == name,
            PropertyKey::Index(_) => false,
        }
    }

    pub fn to_js_string(&self) -> JsString {
        match self {
            PropertyKey::Str(s) => s.clone(),
            PropertyKey::Index(i) => Rc::from(i.to_string()),
        }
    }
}
impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Str(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
        }
    }
}
impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_str(s)
    }
}

/// Returns the index when `s` is the canonical decimal form of an integer below 2^32 - 1.
pub fn canonical_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    let mut n: u64 = 0;
    for b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        n = n * 10 + u64::from(b - b'0');
    }
    if n < u64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}

/// A partially specified descriptor, as passed to `[[DefineOwnProperty]]`. Only the fields whose
/// `honour_*` flag is set take part in the definition.
#[derive(Clone)]
pub struct PropertyDescriptorSetter {
    pub honour_value: bool,
    pub honour_writable: bool,
    pub honour_set: bool,
    pub honour_get: bool,
    pub honour_enumerable: bool,
    pub honour_configurable: bool,
    pub descriptor: PropertyDescriptor,
}
impl PropertyDescriptorSetter {
    pub fn new_from_property_descriptor(desc: PropertyDescriptor) -> Self {
        match desc {
            PropertyDescriptor::Data { .. } => PropertyDescriptorSetter {
                honour_value: true,
                honour_writable: true,
                honour_configurable: true,
                honour_enumerable: true,
                descriptor: desc,
                honour_set: false,
                honour_get: false,
            },
            PropertyDescriptor::Accessor { .. } => PropertyDescriptorSetter {
                honour_set: true,
                honour_get: true,
                honour_configurable: true,
                honour_enumerable: true,
                descriptor: desc,
                honour_value: false,
                honour_writable: false,
            },
        }
    }

    /// A descriptor carrying nothing but a value, as used when writing through an existing
    /// writable data property.
    pub fn new_value(value: JsValue) -> Self {
        PropertyDescriptorSetter {
            honour_value: true,
            honour_writable: false,
            honour_set: false,
            honour_get: false,
            honour_enumerable: false,
            honour_configurable: false,
            descriptor: PropertyDescriptor::new_data(value, false, false, false),
        }
    }

    /// An empty generic descriptor. Fields are switched on by the `with_*` methods.
    pub fn new_generic() -> Self {
        PropertyDescriptorSetter {
            honour_value: false,
            honour_writable: false,
            honour_set: false,
            honour_get: false,
            honour_enumerable: false,
            honour_configurable: false,
            descriptor: PropertyDescriptor::new_data(JsValue::Undefined, false, false, false),
        }
    }

    pub fn with_value(mut self, value: JsValue) -> Self {
        self.make_data();
        self.honour_value = true;
        if let PropertyDescriptor::Data { value: v, .. } = &mut self.descriptor {
            *v = value;
        }
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.make_data();
        self.honour_writable = true;
        if let PropertyDescriptor::Data { writable: w, .. } = &mut self.descriptor {
            *w = writable;
        }
        self
    }

    pub fn with_get(mut self, getter: Option<JsObjectType>) -> Self {
        self.make_accessor();
        self.honour_get = true;
        if let PropertyDescriptor::Accessor { get, .. } = &mut self.descriptor {
            *get = getter;
        }
        self
    }

    pub fn with_set(mut self, setter: Option<JsObjectType>) -> Self {
        self.make_accessor();
        self.honour_set = true;
        if let PropertyDescriptor::Accessor { set, .. } = &mut self.descriptor {
            *set = setter;
        }
        self
    }

    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.honour_enumerable = true;
        match &mut self.descriptor {
            PropertyDescriptor::Data { enumerable: e, .. } => *e = enumerable,
            PropertyDescriptor::Accessor { enumerable: e, .. } => *e = enumerable,
        }
        self
    }

    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.honour_configurable = true;
        match &mut self.descriptor {
            PropertyDescriptor::Data { configurable: c, .. } => *c = configurable,
            PropertyDescriptor::Accessor { configurable: c, .. } => *c = configurable,
        }
        self
    }

    fn make_data(&mut self) {
        if self.descriptor.is_accessor_descriptor() {
            let (e, c) = (
                self.descriptor.is_enumerable(),
                self.descriptor.is_configurable(),
            );
            self.descriptor = PropertyDescriptor::new_data(JsValue::Undefined, false, e, c);
        }
    }

    fn make_accessor(&mut self) {
        if self.descriptor.is_data_descriptor() {
            let (e, c) = (
                self.descriptor.is_enumerable(),
                self.descriptor.is_configurable(),
            );
            self.descriptor = PropertyDescriptor::Accessor {
                get: None,
                set: None,
                enumerable: e,
                configurable: c,
            };
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.honour_configurable
            && !self.honour_enumerable
            && !self.honour_get
            && !self.honour_set
            && !self.honour_value
            && !self.honour_writable
    }

    pub fn is_generic_descriptor(&self) -> bool {
        !self.honour_get && !self.honour_set && !self.honour_value && !self.honour_writable
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.honour_value || self.honour_writable
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.honour_get || self.honour_set
    }

    /// True when every field present here also occurs in `current` with the same value.
    pub(crate) fn is_subset_of(&self, current: &PropertyDescriptor) -> bool {
        if self.honour_enumerable && self.descriptor.is_enumerable() != current.is_enumerable() {
            return false;
        }
        if self.honour_configurable
            && self.descriptor.is_configurable() != current.is_configurable()
        {
            return false;
        }
        match (&self.descriptor, current) {
            (
                PropertyDescriptor::Data {
                    value, writable, ..
                },
                PropertyDescriptor::Data {
                    value: cur_value,
                    writable: cur_writable,
                    ..
                },
            ) => {
                (!self.honour_value || same_value(value, cur_value))
                    && (!self.honour_writable || writable == cur_writable)
            }
            (
                PropertyDescriptor::Accessor { get, set, .. },
                PropertyDescriptor::Accessor {
                    get: cur_get,
                    set: cur_set,
                    ..
                },
            ) => {
                (!self.honour_get || same_function(get, cur_get))
                    && (!self.honour_set || same_function(set, cur_set))
            }
            _ => self.is_generic_descriptor(),
        }
    }
}

fn same_function(a: &Option<JsObjectType>, b: &Option<JsObjectType>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

#[derive(Clone)]
pub enum PropertyDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<JsObjectType>,
        set: Option<JsObjectType>,
        enumerable: bool,
        configurable: bool,
    },
}
impl PropertyDescriptor {
    pub fn new_data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    /// Builds the descriptor of a property that did not exist before: absent fields take their
    /// default values.
    pub(crate) fn new_from_property_descriptor_setter(
        desc_setter: PropertyDescriptorSetter,
    ) -> Self {
        let enumerable = desc_setter.honour_enumerable && desc_setter.descriptor.is_enumerable();
        let configurable =
            desc_setter.honour_configurable && desc_setter.descriptor.is_configurable();
        if desc_setter.is_accessor_descriptor() {
            if let PropertyDescriptor::Accessor { get, set, .. } = desc_setter.descriptor {
                return PropertyDescriptor::Accessor {
                    get: if desc_setter.honour_get { get } else { None },
                    set: if desc_setter.honour_set { set } else { None },
                    enumerable,
                    configurable,
                };
            }
        }
        let (value, writable) = match desc_setter.descriptor {
            PropertyDescriptor::Data {
                value, writable, ..
            } => (
                if desc_setter.honour_value {
                    value
                } else {
                    JsValue::Undefined
                },
                desc_setter.honour_writable && writable,
            ),
            PropertyDescriptor::Accessor { .. } => (JsValue::Undefined, false),
        };
        PropertyDescriptor::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. } => *enumerable,
            PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. } => *configurable,
            PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_writable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { writable, .. } => *writable,
            PropertyDescriptor::Accessor { .. } => false,
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        match self {
            PropertyDescriptor::Data { .. } => true,
            PropertyDescriptor::Accessor { .. } => false,
        }
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        !self.is_data_descriptor()
    }

    pub fn value(&self) -> JsValue {
        match self {
            PropertyDescriptor::Data { value, .. } => value.clone(),
            PropertyDescriptor::Accessor { .. } => JsValue::Undefined,
        }
    }

    pub fn getter(&self) -> Option<JsObjectType> {
        match self {
            PropertyDescriptor::Accessor { get, .. } => get.clone(),
            PropertyDescriptor::Data { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<JsObjectType> {
        match self {
            PropertyDescriptor::Accessor { set, .. } => set.clone(),
            PropertyDescriptor::Data { .. } => None,
        }
    }

    /// Overwrites the fields present in `desc_setter`, converting between data and accessor
    /// shape when the setter asks for the other one.
    pub(crate) fn apply(&mut self, desc_setter: &PropertyDescriptorSetter) {
        let enumerable = if desc_setter.honour_enumerable {
            desc_setter.descriptor.is_enumerable()
        } else {
            self.is_enumerable()
        };
        let configurable = if desc_setter.honour_configurable {
            desc_setter.descriptor.is_configurable()
        } else {
            self.is_configurable()
        };
        if desc_setter.is_data_descriptor() && self.is_accessor_descriptor() {
            *self = PropertyDescriptor::new_data(JsValue::Undefined, false, enumerable, configurable);
        } else if desc_setter.is_accessor_descriptor() && self.is_data_descriptor() {
            *self = PropertyDescriptor::Accessor {
                get: None,
                set: None,
                enumerable,
                configurable,
            };
        }
        match self {
            PropertyDescriptor::Data {
                value,
                writable,
                enumerable: e,
                configurable: c,
            } => {
                if desc_setter.honour_value {
                    *value = desc_setter.descriptor.value();
                }
                if desc_setter.honour_writable {
                    *writable = desc_setter.descriptor.is_writable();
                }
                *e = enumerable;
                *c = configurable;
            }
            PropertyDescriptor::Accessor {
                get,
                set,
                enumerable: e,
                configurable: c,
            } => {
                if desc_setter.honour_get {
                    *get = desc_setter.descriptor.getter();
                }
                if desc_setter.honour_set {
                    *set = desc_setter.descriptor.setter();
                }
                *e = enumerable;
                *c = configurable;
            }
        }
    }

    /// Every value this descriptor keeps alive, for graph walks.
    pub fn references(&self) -> Vec<JsValue> {
        match self {
            PropertyDescriptor::Data { value, .. } => vec![value.clone()],
            PropertyDescriptor::Accessor { get, set, .. } => get
                .iter()
                .chain(set.iter())
                .map(|f| JsValue::Object(f.clone()))
                .collect(),
        }
    }
}
