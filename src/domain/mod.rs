//! Order domain: aggregates and the value objects they are built from.
pub mod aggregates;
pub mod value_objects;
