//! Annotation metadata builder.
//!
//! Given a declaration of a host type model, the builder walks its complete
//! inheritance and interface hierarchy, resolves every annotation value found
//! along the way (nested and repeatable annotations, enum constants, class
//! references, arrays, constants, member defaults) and produces one canonical
//! [`AnnotationMetadata`](annolith_types::AnnotationMetadata).
//!
//! # Example
//!
//! ```ignore
//! use annolith_builder::{Diagnostics, MemoryModel, MetadataBuilder};
//!
//! let model = MemoryModel::from_json_file("model.json")?;
//! let builder = MetadataBuilder::default();
//! let mut diagnostics = Diagnostics::new();
//!
//! let service = model.resolve_type("com.acme.Service").unwrap();
//! let metadata = builder.build(&model, service, &mut diagnostics)?;
//! println!("{:?}", metadata.string_value("javax.inject.Named", "value"));
//! ```

mod assembler;
mod config;
mod defaults;
mod diagnostics;
mod error;
mod hierarchy;
mod model;
mod overrides;
mod validation;
mod values;

#[cfg(test)]
mod fixtures;

pub use assembler::{BuildOptions, MetadataBuilder};
pub use config::BuilderConfig;
pub use defaults::DefaultValueCache;
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, LogSink, Severity};
pub use error::{BuildError, ConfigError, ModelError, Result};
pub use hierarchy::{build_hierarchy, interface_closure, type_ancestors, type_hierarchy};
pub use model::{DeclarationModel, MemoryModel};
pub use overrides::{find_overridden_methods, generics_substitution, signature_matches};
pub use validation::{AnnotationValidator, NonEmptyValidator};
pub use values::{ValueReader, infer_list};
