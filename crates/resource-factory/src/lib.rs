//! Typed resource cache and type table sitting on top of the mount table, plus
//! the `Get`/`Release`/`Reload` critical section.

#![warn(missing_docs)]

mod descriptor;
mod error;
mod factory;
mod handler;

pub use descriptor::{Descriptor, ResourceRef};
pub use error::{FactoryError, FactoryResult};
pub use factory::{Factory, FactoryConfig, ReloadCallback, ReloadEvent};
pub use handler::{
    LoadContext, PostCreateStatus, RecreateOutcome, Resource, ResourceTypeHandler,
};
