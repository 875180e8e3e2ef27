//! Pipeline Intermediate Representation
//!
//! The IR is the bridge between the target graph and backend-native CI
//! configuration files. The compiler produces it; emitters consume it.

mod schema;
mod validation;
mod value;

pub use schema::*;
pub use validation::*;
pub use value::{InputMap, InputValue};
