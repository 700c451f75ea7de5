//! Native callback plumbing: the signatures builtins and host callbacks share, and the registry
//! host callbacks are looked up in.

pub mod registry;
pub mod types;
