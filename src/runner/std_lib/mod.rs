//! Standard library built-in objects.
//!
//! Every realm gets the same minimal set: the global functions, `Object`, `Function`, `Array`,
//! `String`, `Number`, `Boolean`, the error constructors and `console`.

pub mod array;
pub mod console;
pub mod error;
pub mod function;
pub mod global;
pub mod number;
pub mod object;
pub mod string;

use tracing::debug;

use crate::runner::ds::realm::Realm;

/// Installs every built-in object on the realm's global object.
pub fn register_core_builtins(realm: &mut Realm) {
    global::register(realm);
    object::register(realm);
    function::register(realm);
    array::register(realm);
    string::register(realm);
    number::register(realm);
    error::register(realm);
    console::register(realm);
    debug!(realm = %realm.id, "core builtins installed");
}
