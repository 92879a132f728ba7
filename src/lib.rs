//! # Annolith - Compile-time Annotation Metadata
//!
//! Annolith builds the canonical annotation metadata a dependency-injection
//! container needs for each declaration of a program: which annotations apply,
//! with which member values, inherited from where, and with which defaults.
//! It works over any host type model exposed through
//! [`DeclarationModel`], or a JSON document loaded into a [`MemoryModel`].
//!
//! ## ✨ Quick Start
//!
//! ```ignore
//! use annolith::{DeclarationModel, Diagnostics, MemoryModel, MetadataBuilder};
//!
//! let model = MemoryModel::from_json_file("model.json")?;
//! let builder = MetadataBuilder::default();
//! let mut diagnostics = Diagnostics::new();
//!
//! let service = model.resolve_type("com.acme.UserService").unwrap();
//! let metadata = builder.build(&model, service, &mut diagnostics)?;
//!
//! // Values declared on the type win over values declared on its ancestors
//! if let Some(name) = metadata.string_value("javax.inject.Named", "value") {
//!     println!("named {}", name);
//! }
//!
//! // Repeatable annotations come back one instance per application
//! for requires in metadata.annotations_for_type("com.acme.Requires") {
//!     println!("requires {:?}", requires.string_value("property"));
//! }
//!
//! for diagnostic in diagnostics.errors() {
//!     eprintln!("{}", diagnostic.message);
//! }
//! ```
//!
//! ## 🏗️ Architecture
//!
//! - **[`annolith_types`]**: the declaration model, raw value expressions,
//!   canonical values and the assembled metadata
//! - **[`annolith_builder`]**: hierarchy linearization, override resolution
//!   with generics substitution, value conversion, the default value cache and
//!   the metadata assembler
//! - **`annolith-cli`**: the `annolith` binary, building metadata for a JSON
//!   model from the command line
//!
//! ## 🔍 How values are resolved
//!
//! - The hierarchy of a type is its interfaces and superclasses, outermost
//!   ancestor first; the universal root and no-op base classes are skipped
//! - Methods marked as overriding inherit from the methods they override,
//!   parameters from the parameter at the same position
//! - The declaration's own values win; missing members are filled from the
//!   annotation type's defaults (an empty string default counts as none)
//! - Meta-annotations in `java.lang.annotation` only show up on annotation
//!   types themselves; retention defaults to runtime

// Re-export the builder API
pub use annolith_builder::{
    AnnotationValidator, BuildError, BuildOptions, BuilderConfig, ConfigError, DeclarationModel,
    DefaultValueCache, Diagnostic, DiagnosticSink, Diagnostics, LogSink, MemoryModel,
    MetadataBuilder, ModelError, NonEmptyValidator, Result, Severity, ValueReader,
    build_hierarchy, find_overridden_methods,
};

// Re-export the data model
pub use annolith_types::{
    AnnotationEntry, AnnotationInstance, AnnotationMetadata, AnnotationValue, ClassRef,
    ComponentType, DeclId, Declaration, DeclarationKind, Expr, HostValue, Literal, MemberValue,
    Members, NestedAnnotation, RepeatedAnnotations, RetentionPolicy, StereotypeEntry, TypeRef,
    ValueList, ValueSource, name_matches_pattern,
};

pub use annolith_builder;
pub use annolith_types;
