//! Model metadata the compiler resolves names and relations against.
//!
//! A [`SchemaRegistry`] is filled once, either through the builders or by deserializing the JSON
//! handed over by the schema parser, and only read afterwards.

mod model;
mod registry;

pub use model::*;
pub use registry::*;
