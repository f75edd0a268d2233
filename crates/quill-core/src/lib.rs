//! # quill-core
//!
//! Core types of the quill ORM.
//!
//! This crate provides:
//! - [`Value`], a JSON-like tree with its own text format ([`value::parse`],
//!   [`value::stringify`] and the indenting [`value::Pretty`] adapter)
//! - [`Field`], [`FieldType`] and [`FieldOptions`] descriptors
//! - the [`Model`] trait with the dynamic [`Record`] implementation and the
//!   [`model!`] declaration macro
//!
//! ## Quick Start
//!
//! ```
//! use quill_core::{model, value, Model};
//!
//! model! {
//!     pub struct User("users") {
//!         id: Integer => primary_key, auto_increment;
//!         name: String => max_length(50);
//!     }
//! }
//!
//! let user = User::new();
//! assert_eq!(user.primary_key().unwrap().name, "id");
//!
//! let tree = value::parse(r#"{"name":"ada","tags":["a",null,"b"]}"#).unwrap();
//! assert_eq!(tree.to_string(), r#"{"name":"ada","tags":["a","b"]}"#);
//! ```

pub mod model;
pub mod value;

pub use model::{Field, FieldOptions, FieldType, Model, ModelError, Record};
pub use value::{Map, ParseError, Value};
