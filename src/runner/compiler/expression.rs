use std::rc::Rc;

use crate::parser::ast::{
    AssignmentOperator, BinaryOperator, Code, ExpressionType, HasMeta, IdentifierData,
    LiteralType, LogicalOperator, Meta, PropertyData, PropertyKind, UnaryOperator, UpdateOperator,
};
use crate::parser::static_semantics::{Resolution, ScopeId};
use crate::runner::ds::array_object::create_array;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::execution_context::Activation;
use crate::runner::ds::function_object::{call, construct, create_script_function};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyDescriptorSetter, PropertyKey};
use crate::runner::ds::operations::lex_env::{
    get_identifier_environment, get_identifier_reference, new_declarative_environment,
    skip_environment,
};
use crate::runner::ds::operations::object::{define_own_property, delete, get_v, is_callable, put, put_v};
use crate::runner::ds::operations::type_conversion::{
    get_type, number_to_int32, primitive_to_number, to_boolean, to_number, to_object,
    to_property_key, TYPE_STR_UNDEFINED,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::reference::{delete_reference, get_value, put_value};
use crate::runner::eval::types::{EvalError, Reference, ReferenceBase, ValueResult};

use super::declaration::direct_eval;
use super::operators::{
    add, add_primitives, apply_numeric, binary, concat, constant_key, ensure_callable,
    equality, has_property_in, instance_of, numeric_operator, relational, relational_numbers,
};
use super::{CompiledExpression, Compiler, ExprFn, ExpressionClass, TypeSet};

/// Storage of an identifier, as decided by the scope analysis.
#[derive(Clone)]
pub(super) enum Binding {
    Local(usize),
    Environment {
        resolution: Resolution,
        name: JsString,
        strict: bool,
    },
}

fn environment_reference(
    realm: &Realm,
    act: &Activation,
    resolution: Resolution,
    name: &JsString,
    strict: bool,
) -> Reference {
    match resolution {
        Resolution::Fixed { skip } => {
            Reference::environment(skip_environment(&act.lex_env, skip), name.clone(), strict)
        }
        Resolution::Global => Reference::environment(realm.global_env.clone(), name.clone(), strict),
        Resolution::Dynamic { skip } => match get_identifier_environment(&act.lex_env, skip, name) {
            Some(env) => Reference::environment(env, name.clone(), strict),
            None => Reference::unresolvable(name.clone(), strict),
        },
        Resolution::Local(_) => get_identifier_reference(&act.lex_env, name.clone(), strict),
    }
}

impl Binding {
    /// The reference of a binding living in an environment, `None` for local slots.
    pub(super) fn reference(&self, realm: &Realm, act: &Activation) -> Option<Reference> {
        match self {
            Binding::Local(_) => None,
            Binding::Environment {
                resolution,
                name,
                strict,
            } => Some(environment_reference(realm, act, *resolution, name, *strict)),
        }
    }

    pub(super) fn get(&self, realm: &mut Realm, act: &Activation) -> ValueResult {
        match self {
            Binding::Local(slot) => Ok(act.get_local(*slot)),
            Binding::Environment {
                resolution: Resolution::Fixed { skip },
                name,
                strict,
            } => {
                let env = skip_environment(&act.lex_env, *skip);
                env.inner.as_env_record().get_binding_value(realm, name, *strict)
            }
            Binding::Environment {
                resolution: Resolution::Global,
                name,
                strict,
            } => {
                let env = realm.global_env.clone();
                env.inner.as_env_record().get_binding_value(realm, name, *strict)
            }
            Binding::Environment {
                resolution,
                name,
                strict,
            } => {
                let r = environment_reference(realm, act, *resolution, name, *strict);
                get_value(realm, &r)
            }
        }
    }
}

/// A property name, folded to a key while compiling whenever it is a literal.
pub(super) enum CompiledKey {
    Static(PropertyKey),
    Dynamic(ExprFn),
}
impl CompiledKey {
    fn evaluate(&self, realm: &mut Realm, act: &mut Activation) -> Result<PropertyKey, EvalError> {
        match self {
            CompiledKey::Static(key) => Ok(key.clone()),
            CompiledKey::Dynamic(f) => {
                let v = f(realm, act)?;
                to_property_key(realm, &v)
            }
        }
    }
}

/// Left-hand side of an assignment, update, `for-in` or `delete`.
pub(super) enum Target {
    Binding(Binding),
    Property { object: ExprFn, key: CompiledKey },
    /// Any other expression; only `delete` accepts it.
    Value(ExprFn),
}

/// An evaluated target: the reference the assignment goes through.
pub(super) enum Place {
    Local(usize),
    Reference(Reference),
    Property(JsValue, PropertyKey),
    Value,
}
impl Place {
    pub(super) fn get(&self, realm: &mut Realm, act: &Activation) -> ValueResult {
        match self {
            Place::Local(slot) => Ok(act.get_local(*slot)),
            Place::Reference(r) => get_value(realm, r),
            Place::Property(base, key) => get_v(realm, base, key),
            Place::Value => Ok(JsValue::Undefined),
        }
    }

    pub(super) fn put(
        &self,
        realm: &mut Realm,
        act: &Activation,
        value: JsValue,
        strict: bool,
    ) -> Result<(), EvalError> {
        match self {
            Place::Local(slot) => {
                act.set_local(*slot, value);
                Ok(())
            }
            Place::Reference(r) => put_value(realm, r, value),
            Place::Property(base, key) => put_v(realm, base, key, value, strict),
            Place::Value => Err(realm.error(JErrorType::ReferenceError(
                "Invalid left-hand side in assignment".to_string(),
            ))),
        }
    }
}

impl Target {
    pub(super) fn place(&self, realm: &mut Realm, act: &mut Activation) -> Result<Place, EvalError> {
        match self {
            Target::Binding(Binding::Local(slot)) => Ok(Place::Local(*slot)),
            Target::Binding(b) => Ok(b
                .reference(realm, act)
                .map_or(Place::Value, Place::Reference)),
            Target::Property { object, key } => {
                let base = object(realm, act)?;
                let key = key.evaluate(realm, act)?;
                Ok(Place::Property(base, key))
            }
            Target::Value(f) => {
                f(realm, act)?;
                Ok(Place::Value)
            }
        }
    }
}

fn evaluate_arguments(
    args: &[ExprFn],
    realm: &mut Realm,
    act: &mut Activation,
) -> Result<Vec<JsValue>, EvalError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(a(realm, act)?);
    }
    Ok(values)
}

fn literal_value(value: &LiteralType) -> JsValue {
    match value {
        LiteralType::NullLiteral => JsValue::Null,
        LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
        LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
        LiteralType::NumberLiteral(n) => JsValue::Number(*n),
    }
}

fn is_eval_function(realm: &Realm, f: &JsValue) -> bool {
    match f {
        JsValue::Object(o) => Rc::ptr_eq(o, &realm.intrinsics.eval_function),
        _ => false,
    }
}

fn data_setter(value: JsValue) -> PropertyDescriptorSetter {
    PropertyDescriptorSetter::new_from_property_descriptor(PropertyDescriptor::new_data(
        value, true, true, true,
    ))
}

impl Compiler {
    pub(super) fn binding_of(&self, id: &IdentifierData) -> Binding {
        match self.scopes.borrow().resolve(id.scope, &id.name) {
            Resolution::Local(slot) => Binding::Local(slot),
            resolution => Binding::Environment {
                resolution,
                name: id.name.clone(),
                strict: self.strict(),
            },
        }
    }

    pub(super) fn compile_target(&mut self, expr: &ExpressionType) -> Target {
        match expr {
            ExpressionType::Identifier(id) => Target::Binding(self.binding_of(id)),
            ExpressionType::MemberExpression {
                object, property, ..
            } => Target::Property {
                object: self.compile_expression(object).eval,
                key: self.compile_key(property),
            },
            other => Target::Value(self.compile_expression(other).eval),
        }
    }

    fn compile_key(&mut self, property: &ExpressionType) -> CompiledKey {
        let compiled = self.compile_expression(property);
        match compiled.constant_value().and_then(constant_key) {
            Some(key) => CompiledKey::Static(key),
            None => CompiledKey::Dynamic(compiled.eval),
        }
    }

    pub(super) fn compile_expression(&mut self, expr: &ExpressionType) -> CompiledExpression {
        match expr {
            ExpressionType::Literal { value, .. } => CompiledExpression::constant(literal_value(value)),
            ExpressionType::ThisExpression { .. } => CompiledExpression::computed(
                TypeSet::ANY,
                Box::new(|_, act| Ok(act.this_value.clone())),
            ),
            ExpressionType::Identifier(id) => {
                let binding = self.binding_of(id);
                CompiledExpression {
                    eval: Box::new(move |realm, act| binding.get(realm, act)),
                    types: TypeSet::ANY,
                    class: ExpressionClass::Variable,
                }
            }
            ExpressionType::ArrayExpression { elements, .. } => self.compile_array(elements),
            ExpressionType::ObjectExpression { properties, .. } => self.compile_object(properties),
            ExpressionType::FunctionExpression {
                code, name_scope, ..
            } => self.compile_function_expression(code, *name_scope),
            ExpressionType::MemberExpression {
                object, property, ..
            } => {
                let object = self.compile_expression(object).eval;
                let key = self.compile_key(property);
                CompiledExpression::computed(
                    TypeSet::ANY,
                    Box::new(move |realm, act| {
                        let base = object(realm, act)?;
                        let key = key.evaluate(realm, act)?;
                        get_v(realm, &base, &key)
                    }),
                )
            }
            ExpressionType::CallExpression {
                meta,
                callee,
                arguments,
            } => self.compile_call(meta, callee, arguments),
            ExpressionType::NewExpression {
                meta,
                callee,
                arguments,
            } => {
                let description = self.text_of(callee.get_meta());
                let callee = self.compile_expression(callee).eval;
                let args: Vec<ExprFn> = arguments
                    .iter()
                    .map(|a| self.compile_expression(a).eval)
                    .collect();
                let position = meta.start_index;
                CompiledExpression::computed(
                    TypeSet::OBJECT,
                    Box::new(move |realm, act| {
                        let f = callee(realm, act)?;
                        let argv = evaluate_arguments(&args, realm, act)?;
                        realm.set_position(position);
                        if !is_callable(&f) {
                            return Err(realm.error(JErrorType::TypeError(format!(
                                "{} is not a constructor",
                                description
                            ))));
                        }
                        construct(realm, &f, argv)
                    }),
                )
            }
            ExpressionType::UnaryExpression {
                operator, argument, ..
            } => self.compile_unary(*operator, argument),
            ExpressionType::UpdateExpression {
                operator,
                argument,
                prefix,
                ..
            } => {
                let target = self.compile_target(argument);
                let delta = match operator {
                    UpdateOperator::PlusPlus => 1.0,
                    UpdateOperator::MinusMinus => -1.0,
                };
                let prefix = *prefix;
                let strict = self.strict();
                CompiledExpression::computed(
                    TypeSet::NUMBER,
                    Box::new(move |realm, act| {
                        let place = target.place(realm, act)?;
                        let old = place.get(realm, act)?;
                        let old = to_number(realm, &old)?;
                        let new = old + delta;
                        place.put(realm, act, JsValue::Number(new), strict)?;
                        Ok(JsValue::Number(if prefix { new } else { old }))
                    }),
                )
            }
            ExpressionType::BinaryExpression {
                operator,
                left,
                right,
                ..
            } => self.compile_binary(*operator, left, right),
            ExpressionType::LogicalExpression {
                operator,
                left,
                right,
                ..
            } => {
                let left = self.compile_expression(left);
                let right = self.compile_expression(right);
                let types = left.types.union(right.types);
                let (lf, rf) = (left.eval, right.eval);
                let eval: ExprFn = match operator {
                    LogicalOperator::And => Box::new(move |realm, act| {
                        let v = lf(realm, act)?;
                        if to_boolean(&v) {
                            rf(realm, act)
                        } else {
                            Ok(v)
                        }
                    }),
                    LogicalOperator::Or => Box::new(move |realm, act| {
                        let v = lf(realm, act)?;
                        if to_boolean(&v) {
                            Ok(v)
                        } else {
                            rf(realm, act)
                        }
                    }),
                };
                CompiledExpression::computed(types, eval)
            }
            ExpressionType::ConditionalExpression {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.compile_expression(test).eval;
                let consequent = self.compile_expression(consequent);
                let alternate = self.compile_expression(alternate);
                let types = consequent.types.union(alternate.types);
                let (cf, af) = (consequent.eval, alternate.eval);
                CompiledExpression::computed(
                    types,
                    Box::new(move |realm, act| {
                        if to_boolean(&test(realm, act)?) {
                            cf(realm, act)
                        } else {
                            af(realm, act)
                        }
                    }),
                )
            }
            ExpressionType::AssignmentExpression {
                operator,
                left,
                right,
                ..
            } => self.compile_assignment(*operator, left, right),
            ExpressionType::SequenceExpression { expressions, .. } => {
                let mut compiled: Vec<CompiledExpression> = expressions
                    .iter()
                    .map(|e| self.compile_expression(e))
                    .collect();
                let types = compiled.last().map_or(TypeSet::UNDEFINED, |c| c.types);
                let fns: Vec<ExprFn> = compiled.drain(..).map(|c| c.eval).collect();
                CompiledExpression::computed(
                    types,
                    Box::new(move |realm, act| {
                        let mut v = JsValue::Undefined;
                        for f in &fns {
                            v = f(realm, act)?;
                        }
                        Ok(v)
                    }),
                )
            }
        }
    }

    fn compile_array(&mut self, elements: &[Option<ExpressionType>]) -> CompiledExpression {
        let elements: Vec<Option<ExprFn>> = elements
            .iter()
            .map(|e| e.as_ref().map(|e| self.compile_expression(e).eval))
            .collect();
        let has_holes = elements.iter().any(Option::is_none);
        CompiledExpression::computed(
            TypeSet::OBJECT,
            Box::new(move |realm, act| {
                if !has_holes {
                    let mut values = Vec::with_capacity(elements.len());
                    for e in elements.iter().flatten() {
                        values.push(e(realm, act)?);
                    }
                    return Ok(JsValue::Object(create_array(realm, values)));
                }
                let array = create_array(realm, vec![]);
                for (i, e) in elements.iter().enumerate() {
                    if let Some(e) = e {
                        let v = e(realm, act)?;
                        define_own_property(
                            realm,
                            &array,
                            PropertyKey::from_index(i as u32),
                            data_setter(v),
                            false,
                        )?;
                    }
                }
                put(
                    realm,
                    &array,
                    &PropertyKey::from_str("length"),
                    JsValue::Number(elements.len() as f64),
                    false,
                )?;
                Ok(JsValue::Object(array))
            }),
        )
    }

    fn compile_object(&mut self, properties: &[PropertyData]) -> CompiledExpression {
        let properties: Vec<(PropertyKey, PropertyKind, ExprFn)> = properties
            .iter()
            .map(|p| {
                (
                    PropertyKey::from_js_string(&p.key),
                    p.kind,
                    self.compile_expression(&p.value).eval,
                )
            })
            .collect();
        CompiledExpression::computed(
            TypeSet::OBJECT,
            Box::new(move |realm, act| {
                let o = realm.new_plain_object();
                for (key, kind, value) in &properties {
                    let v = value(realm, act)?;
                    let desc = match kind {
                        PropertyKind::Init => data_setter(v),
                        PropertyKind::Get => PropertyDescriptorSetter::new_generic()
                            .with_get(v.as_object().cloned())
                            .with_enumerable(true)
                            .with_configurable(true),
                        PropertyKind::Set => PropertyDescriptorSetter::new_generic()
                            .with_set(v.as_object().cloned())
                            .with_enumerable(true)
                            .with_configurable(true),
                    };
                    define_own_property(realm, &o, key.clone(), desc, false)?;
                }
                Ok(JsValue::Object(o))
            }),
        )
    }

    fn compile_function_expression(
        &mut self,
        code: &Rc<Code>,
        name_scope: Option<ScopeId>,
    ) -> CompiledExpression {
        let code = code.clone();
        let scope = name_scope.map(|s| {
            let tree = self.scopes.borrow();
            let name = code.name.clone().unwrap_or_else(|| Rc::from(""));
            let slot = tree.local_slot(s, &name);
            (tree.is_collapsed(s), slot, name)
        });
        CompiledExpression::computed(
            TypeSet::OBJECT,
            Box::new(move |realm, act| match &scope {
                None => Ok(JsValue::Object(create_script_function(
                    realm,
                    code.clone(),
                    act.lex_env.clone(),
                ))),
                Some((collapsed, slot, name)) => {
                    let env = if *collapsed {
                        act.lex_env.clone()
                    } else {
                        new_declarative_environment(Some(act.lex_env.clone()))
                    };
                    let f = JsValue::Object(create_script_function(realm, code.clone(), env.clone()));
                    match slot {
                        Some(slot) => act.set_local(*slot, f.clone()),
                        None => {
                            if let Some(d) = env.inner.as_declarative() {
                                d.create_immutable_binding(name.clone());
                                d.initialize_immutable_binding(name, f.clone());
                            }
                        }
                    }
                    Ok(f)
                }
            }),
        )
    }

    fn compile_call(
        &mut self,
        meta: &Meta,
        callee: &ExpressionType,
        arguments: &[ExpressionType],
    ) -> CompiledExpression {
        let description = self.text_of(callee.get_meta());
        let args: Vec<ExprFn> = arguments
            .iter()
            .map(|a| self.compile_expression(a).eval)
            .collect();
        let position = meta.start_index;
        let strict = self.strict();
        let eval: ExprFn = match callee {
            ExpressionType::MemberExpression {
                object, property, ..
            } => {
                let object = self.compile_expression(object).eval;
                let key = self.compile_key(property);
                Box::new(move |realm, act| {
                    let base = object(realm, act)?;
                    let key = key.evaluate(realm, act)?;
                    let f = get_v(realm, &base, &key)?;
                    let argv = evaluate_arguments(&args, realm, act)?;
                    realm.set_position(position);
                    ensure_callable(realm, &f, &description)?;
                    call(realm, &f, base, argv)
                })
            }
            ExpressionType::Identifier(id) => {
                let binding = self.binding_of(id);
                let maybe_eval = &*id.name == "eval";
                Box::new(move |realm, act| {
                    let (f, this) = match binding.reference(realm, act) {
                        None => (binding.get(realm, act)?, JsValue::Undefined),
                        Some(r) => {
                            let f = get_value(realm, &r)?;
                            let this = match &r.base {
                                ReferenceBase::Environment(env) => {
                                    env.inner.as_env_record().implicit_this_value()
                                }
                                _ => JsValue::Undefined,
                            };
                            (f, this)
                        }
                    };
                    let argv = evaluate_arguments(&args, realm, act)?;
                    realm.set_position(position);
                    if maybe_eval && is_eval_function(realm, &f) {
                        return direct_eval(realm, act, argv, strict);
                    }
                    ensure_callable(realm, &f, &description)?;
                    call(realm, &f, this, argv)
                })
            }
            other => {
                let callee = self.compile_expression(other).eval;
                Box::new(move |realm, act| {
                    let f = callee(realm, act)?;
                    let argv = evaluate_arguments(&args, realm, act)?;
                    realm.set_position(position);
                    ensure_callable(realm, &f, &description)?;
                    call(realm, &f, JsValue::Undefined, argv)
                })
            }
        };
        CompiledExpression::computed(TypeSet::ANY, eval)
    }

    fn compile_unary(&mut self, operator: UnaryOperator, argument: &ExpressionType) -> CompiledExpression {
        match operator {
            UnaryOperator::TypeOf => {
                if let ExpressionType::Identifier(id) = argument {
                    let binding = self.binding_of(id);
                    return CompiledExpression::computed(
                        TypeSet::STRING,
                        Box::new(move |realm, act| {
                            let v = match binding.reference(realm, act) {
                                None => binding.get(realm, act)?,
                                Some(r) if r.is_unresolvable() => {
                                    return Ok(JsValue::from_str(TYPE_STR_UNDEFINED))
                                }
                                Some(r) => get_value(realm, &r)?,
                            };
                            Ok(JsValue::from_str(get_type(&v)))
                        }),
                    );
                }
                let arg = self.compile_expression(argument);
                if let Some(v) = arg.constant_value() {
                    return CompiledExpression::constant(JsValue::from_str(get_type(v)));
                }
                let f = arg.eval;
                CompiledExpression::computed(
                    TypeSet::STRING,
                    Box::new(move |realm, act| Ok(JsValue::from_str(get_type(&f(realm, act)?)))),
                )
            }
            UnaryOperator::Delete => {
                let strict = self.strict();
                let target = self.compile_target(argument);
                CompiledExpression::computed(
                    TypeSet::BOOLEAN,
                    Box::new(move |realm, act| {
                        let deleted = match target.place(realm, act)? {
                            Place::Local(_) => false,
                            Place::Reference(r) => delete_reference(realm, &r)?,
                            Place::Property(base, key) => {
                                let o = to_object(realm, &base)?;
                                delete(realm, &o, &key, strict)?
                            }
                            Place::Value => true,
                        };
                        Ok(JsValue::Boolean(deleted))
                    }),
                )
            }
            UnaryOperator::Void => {
                let f = self.compile_expression(argument).eval;
                CompiledExpression::computed(
                    TypeSet::UNDEFINED,
                    Box::new(move |realm, act| {
                        f(realm, act)?;
                        Ok(JsValue::Undefined)
                    }),
                )
            }
            UnaryOperator::LogicalNot => {
                let arg = self.compile_expression(argument);
                if let Some(v) = arg.constant_value() {
                    return CompiledExpression::constant(JsValue::Boolean(!to_boolean(v)));
                }
                let f = arg.eval;
                CompiledExpression::computed(
                    TypeSet::BOOLEAN,
                    Box::new(move |realm, act| Ok(JsValue::Boolean(!to_boolean(&f(realm, act)?)))),
                )
            }
            UnaryOperator::Minus | UnaryOperator::Plus | UnaryOperator::BitwiseNot => {
                let op: fn(f64) -> f64 = match operator {
                    UnaryOperator::Minus => |n| -n,
                    UnaryOperator::Plus => |n| n,
                    _ => |n| f64::from(!number_to_int32(n)),
                };
                let arg = self.compile_expression(argument);
                if let Some(v) = arg.constant_value() {
                    if TypeSet::of(v).is_primitive() {
                        return CompiledExpression::constant(JsValue::Number(op(primitive_to_number(v))));
                    }
                }
                let f = arg.eval;
                if arg.types.is_primitive() {
                    return CompiledExpression::computed(
                        TypeSet::NUMBER,
                        Box::new(move |realm, act| {
                            Ok(JsValue::Number(op(primitive_to_number(&f(realm, act)?))))
                        }),
                    );
                }
                CompiledExpression::computed(
                    TypeSet::NUMBER,
                    Box::new(move |realm, act| {
                        let v = f(realm, act)?;
                        Ok(JsValue::Number(op(to_number(realm, &v)?)))
                    }),
                )
            }
        }
    }

    fn compile_binary(
        &mut self,
        operator: BinaryOperator,
        left: &ExpressionType,
        right: &ExpressionType,
    ) -> CompiledExpression {
        let left = self.compile_expression(left);
        let right = self.compile_expression(right);
        let (lt, rt) = (left.types, right.types);
        let primitive = lt.is_primitive() && rt.is_primitive();
        let numbers = lt.is_within(TypeSet::NUMBER) && rt.is_within(TypeSet::NUMBER);

        if let (Some(a), Some(b)) = (left.constant_value(), right.constant_value()) {
            if primitive {
                if let Some(op) = numeric_operator(operator) {
                    return CompiledExpression::constant(JsValue::Number(op(
                        primitive_to_number(a),
                        primitive_to_number(b),
                    )));
                }
                if operator == BinaryOperator::Add {
                    return CompiledExpression::constant(add_primitives(a, b));
                }
            }
        }

        let (lf, rf) = (left.eval, right.eval);
        if let Some(op) = numeric_operator(operator) {
            let eval: ExprFn = if primitive {
                Box::new(move |realm, act| {
                    let a = lf(realm, act)?;
                    let b = rf(realm, act)?;
                    Ok(JsValue::Number(op(primitive_to_number(&a), primitive_to_number(&b))))
                })
            } else {
                Box::new(move |realm, act| {
                    let a = lf(realm, act)?;
                    let b = rf(realm, act)?;
                    apply_numeric(realm, op, &a, &b)
                })
            };
            return CompiledExpression::computed(TypeSet::NUMBER, eval);
        }

        match operator {
            BinaryOperator::Add => {
                if numbers {
                    CompiledExpression::computed(
                        TypeSet::NUMBER,
                        Box::new(move |realm, act| {
                            let a = lf(realm, act)?;
                            let b = rf(realm, act)?;
                            Ok(JsValue::Number(primitive_to_number(&a) + primitive_to_number(&b)))
                        }),
                    )
                } else if primitive && (lt.is_within(TypeSet::STRING) || rt.is_within(TypeSet::STRING)) {
                    CompiledExpression::computed(
                        TypeSet::STRING,
                        Box::new(move |realm, act| {
                            let a = lf(realm, act)?;
                            let b = rf(realm, act)?;
                            Ok(concat(&a, &b))
                        }),
                    )
                } else if primitive {
                    CompiledExpression::computed(
                        TypeSet::NUMBER.union(TypeSet::STRING),
                        Box::new(move |realm, act| {
                            let a = lf(realm, act)?;
                            let b = rf(realm, act)?;
                            Ok(add_primitives(&a, &b))
                        }),
                    )
                } else {
                    // A string operand makes the result a string whatever the other side is.
                    let types = if lt.is_within(TypeSet::STRING) || rt.is_within(TypeSet::STRING) {
                        TypeSet::STRING
                    } else {
                        TypeSet::NUMBER.union(TypeSet::STRING)
                    };
                    CompiledExpression::computed(
                        types,
                        Box::new(move |realm, act| {
                            let a = lf(realm, act)?;
                            let b = rf(realm, act)?;
                            add(realm, &a, &b)
                        }),
                    )
                }
            }
            BinaryOperator::LessThan
            | BinaryOperator::GreaterThan
            | BinaryOperator::LessThanEqual
            | BinaryOperator::GreaterThanEqual => {
                let eval: ExprFn = if numbers {
                    Box::new(move |realm, act| {
                        let a = lf(realm, act)?;
                        let b = rf(realm, act)?;
                        Ok(JsValue::Boolean(relational_numbers(
                            operator,
                            primitive_to_number(&a),
                            primitive_to_number(&b),
                        )))
                    })
                } else {
                    Box::new(move |realm, act| {
                        let a = lf(realm, act)?;
                        let b = rf(realm, act)?;
                        relational(realm, operator, &a, &b)
                    })
                };
                CompiledExpression::computed(TypeSet::BOOLEAN, eval)
            }
            BinaryOperator::LooselyEqual | BinaryOperator::LooselyUnequal
                if primitive && lt == rt && lt.is_single() =>
            {
                let negate = operator == BinaryOperator::LooselyUnequal;
                CompiledExpression::computed(
                    TypeSet::BOOLEAN,
                    Box::new(move |realm, act| {
                        let a = lf(realm, act)?;
                        let b = rf(realm, act)?;
                        let eq = equality(realm, BinaryOperator::StrictlyEqual, &a, &b)?;
                        Ok(JsValue::Boolean(negate != to_boolean(&eq)))
                    }),
                )
            }
            BinaryOperator::In => CompiledExpression::computed(
                TypeSet::BOOLEAN,
                Box::new(move |realm, act| {
                    let a = lf(realm, act)?;
                    let b = rf(realm, act)?;
                    has_property_in(realm, &a, &b)
                }),
            ),
            BinaryOperator::InstanceOf => CompiledExpression::computed(
                TypeSet::BOOLEAN,
                Box::new(move |realm, act| {
                    let a = lf(realm, act)?;
                    let b = rf(realm, act)?;
                    instance_of(realm, &a, &b)
                }),
            ),
            _ => CompiledExpression::computed(
                TypeSet::BOOLEAN,
                Box::new(move |realm, act| {
                    let a = lf(realm, act)?;
                    let b = rf(realm, act)?;
                    equality(realm, operator, &a, &b)
                }),
            ),
        }
    }

    fn compile_assignment(
        &mut self,
        operator: AssignmentOperator,
        left: &ExpressionType,
        right: &ExpressionType,
    ) -> CompiledExpression {
        let target = self.compile_target(left);
        let right = self.compile_expression(right);
        let strict = self.strict();
        let rf = right.eval;
        match operator.binary_operator() {
            None => CompiledExpression::computed(
                right.types,
                Box::new(move |realm, act| {
                    let place = target.place(realm, act)?;
                    let v = rf(realm, act)?;
                    place.put(realm, act, v.clone(), strict)?;
                    Ok(v)
                }),
            ),
            Some(op) => {
                let types = match op {
                    BinaryOperator::Add => TypeSet::NUMBER.union(TypeSet::STRING),
                    _ => TypeSet::NUMBER,
                };
                CompiledExpression::computed(
                    types,
                    Box::new(move |realm, act| {
                        let place = target.place(realm, act)?;
                        let old = place.get(realm, act)?;
                        let r = rf(realm, act)?;
                        let v = binary(realm, op, &old, &r)?;
                        place.put(realm, act, v.clone(), strict)?;
                        Ok(v)
                    }),
                )
            }
        }
    }
}
