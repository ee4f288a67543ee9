// handlers/mod.rs - HTTP handlers
//
// entity: one generic CRUD handler set, mounted per entity kind
// auth:   login, logout and token refresh
// health: liveness and dependency status

pub mod auth;
pub mod entity;
pub mod health;

pub use entity::EntityState;
