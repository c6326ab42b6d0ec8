//! stackforge template engine
//!
//! Builds a declarative resource graph (parameters, resources, outputs),
//! validates it and renders it as a CloudFormation document.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               TemplateBuilder                 │
//! │  declare_parameter → declare_resource → ...   │
//! │         (handles carry builder identity)      │
//! └───────────────────┬──────────────────────────┘
//!                     │ render()
//! ┌───────────────────▼──────────────────────────┐
//! │                  Document                     │
//! │   validated, topologically ordered, frozen    │
//! └──────────┬────────────────────┬──────────────┘
//!            │ to_json / to_yaml  │
//!            ▼                    ▼
//!      template body ──► StackSubmitter::create_stack
//! ```

pub mod builder;
pub mod error;
mod graph;
pub mod kind;
pub mod model;
pub mod render;
pub mod submit;
pub mod value;

// Re-exports
pub use builder::TemplateBuilder;
pub use error::{Result, TemplateError};
pub use kind::{Capability, ResourceKind};
pub use model::{Document, FORMAT_VERSION, Output, Parameter, ParameterType, Resource};
pub use render::Format;
pub use submit::{CreateStackRequest, StackReceipt, StackSubmitter, SubmitError, submit};
pub use value::{ParameterHandle, Properties, Pseudo, Reference, ResourceHandle, Value};
