use std::rc::Rc;

use crate::runner::ds::env_record::{
    DeclarativeEnvironmentRecord, EnvironmentRecordType, ObjectEnvironmentRecord,
};
use crate::runner::ds::lex_env::{JsLexEnvironmentType, LexEnvironment};
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::value::JsString;
use crate::runner::eval::types::Reference;

pub fn new_declarative_environment(outer: Option<JsLexEnvironmentType>) -> JsLexEnvironmentType {
    Rc::new(LexEnvironment {
        inner: EnvironmentRecordType::Declarative(DeclarativeEnvironmentRecord::new()),
        outer,
    })
}

pub fn new_object_environment(
    o: JsObjectType,
    outer: Option<JsLexEnvironmentType>,
    provide_this: bool,
) -> JsLexEnvironmentType {
    Rc::new(LexEnvironment {
        inner: EnvironmentRecordType::Object(ObjectEnvironmentRecord::new(o, provide_this)),
        outer,
    })
}

/// Walks the chain from `lex` and returns the first environment holding `name`.
pub fn find_binding_environment(
    lex: &JsLexEnvironmentType,
    name: &JsString,
) -> Option<JsLexEnvironmentType> {
    let mut env = Some(lex.clone());
    while let Some(e) = env {
        if e.inner.as_env_record().has_binding(name) {
            return Some(e);
        }
        env = e.outer.clone();
    }
    None
}

pub fn get_identifier_reference(
    lex: &JsLexEnvironmentType,
    name: JsString,
    strict: bool,
) -> Reference {
    match find_binding_environment(lex, &name) {
        Some(env) => Reference::environment(env, name, strict),
        None => Reference::unresolvable(name, strict),
    }
}

/// The environment `skip` links outward from `lex`. The chain is never shorter than a
/// statically counted skip, so running off the end yields the outermost record.
pub fn skip_environment(lex: &JsLexEnvironmentType, skip: usize) -> JsLexEnvironmentType {
    let mut env = lex.clone();
    for _ in 0..skip {
        match &env.outer {
            Some(o) => {
                let o = o.clone();
                env = o;
            }
            None => break,
        }
    }
    env
}

/// Skips `skip` statically known records, then searches dynamically for `name`.
pub fn get_identifier_environment(
    lex: &JsLexEnvironmentType,
    skip: usize,
    name: &JsString,
) -> Option<JsLexEnvironmentType> {
    find_binding_environment(&skip_environment(lex, skip), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::env_record::EnvironmentRecord;
    use crate::runner::ds::realm::{Realm, RealmConfig};

    #[test]
    fn test_resolution_walks_outward() {
        let mut realm = Realm::new(RealmConfig::default());
        let outer = new_declarative_environment(None);
        let inner = new_declarative_environment(Some(outer.clone()));
        let name: JsString = Rc::from("a");
        outer
            .inner
            .as_env_record()
            .create_mutable_binding(&mut realm, name.clone(), false)
            .unwrap();
        let found = find_binding_environment(&inner, &name).unwrap();
        assert!(Rc::ptr_eq(&found, &outer));
        assert!(Rc::ptr_eq(&skip_environment(&inner, 1), &outer));
        assert!(get_identifier_environment(&inner, 0, &Rc::from("b")).is_none());
        assert!(get_identifier_reference(&inner, Rc::from("b"), true).is_unresolvable());
    }
}
