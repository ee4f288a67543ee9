pub mod catalog;
pub mod entity;

pub use catalog::ENTITIES;
pub use entity::{EntityDescriptor, FieldDescriptor, FieldFormat, FieldType};
