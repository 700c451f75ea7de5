use std::rc::Rc;

use crate::runner::ds::env_record::EnvironmentRecordType;

pub type JsLexEnvironmentType = Rc<LexEnvironment>;

/// One link of the runtime scope chain.
pub struct LexEnvironment {
    pub inner: EnvironmentRecordType,
    pub outer: Option<JsLexEnvironmentType>,
}
