//! API request/response schema types.
//!
//! Request types derive `Deserialize`, response types derive `Serialize`.
//! Field names are camelCase, following the portal's action parameters.

pub mod actions;
pub mod layout;
pub mod users;
