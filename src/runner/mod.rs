pub mod api;
pub mod compiler;
pub mod ds;
pub mod eval;
pub mod plugin;
pub mod std_lib;
