//! Form engine
//!
//! Expands the declarative schema into form instances, derives their
//! current values from the configuration stores, binds submitted data and
//! reduces the bound instances into one submission.

pub mod binder;
pub mod body;
pub mod builder;
pub mod fields;
pub mod reduce;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod value;
pub mod view;

pub use builder::{BoundField, FormInstance, build_forms, derive_defaults};
pub use reduce::{Merged, Reduction, Submission, reduce};
pub use registry::{FieldDef, FormRegistry, GroupDef};
pub use schema::{FieldKind, Schema, SectionKind};
pub use value::{FieldValue, Pair};
pub use view::{FieldView, FormView, render};
