//! Metadata assembly.
//!
//! The assembler linearizes a declaration's hierarchy and merges every
//! annotation found on it into one [`AnnotationMetadata`]. The hierarchy is
//! visited from the declaration itself outwards and the first value written
//! for a member wins, so the declaration's own values take precedence over
//! inherited ones.

use std::sync::Arc;

use annolith_types::{
    AnnotationEntry, AnnotationInstance, AnnotationMetadata, AnnotationValue, DeclId, Expr,
    HostValue, MemberValue, Members, RepeatedAnnotations, RepeatedInstance, RetentionPolicy,
    StereotypeEntry, ValueSource,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::BuilderConfig;
use crate::defaults::DefaultValueCache;
use crate::diagnostics::DiagnosticSink;
use crate::error::{BuildError, Result};
use crate::hierarchy::build_hierarchy;
use crate::model::DeclarationModel;
use crate::validation::AnnotationValidator;
use crate::values::ValueReader;

/// Per-build options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Methods also inherit the annotations of their declaring type hierarchy
    pub inherit_type_annotations: bool,
    /// Only look at the declaration itself, not its ancestors
    pub declared_only: bool,
}

/// Builds [`AnnotationMetadata`] for declarations of a model.
///
/// A builder owns the session's [`DefaultValueCache`] and can be shared
/// between threads building independent declarations.
pub struct MetadataBuilder {
    config: BuilderConfig,
    defaults: Arc<DefaultValueCache>,
    validator: Option<Box<dyn AnnotationValidator + Send + Sync>>,
}

impl std::fmt::Debug for MetadataBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataBuilder")
            .field("config", &self.config)
            .field("cached_defaults", &self.defaults.len())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl MetadataBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self::with_cache(config, Arc::new(DefaultValueCache::new()))
    }

    /// Create a builder sharing an existing default value cache.
    pub fn with_cache(config: BuilderConfig, defaults: Arc<DefaultValueCache>) -> Self {
        Self {
            config,
            defaults,
            validator: None,
        }
    }

    /// Validate every recorded member value.
    pub fn with_validator(mut self, validator: impl AnnotationValidator + Send + Sync + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn defaults(&self) -> &Arc<DefaultValueCache> {
        &self.defaults
    }

    /// Build the metadata of a declaration with default options.
    pub fn build<M: DeclarationModel + ?Sized>(
        &self,
        model: &M,
        decl: DeclId,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<AnnotationMetadata> {
        self.build_with(model, decl, BuildOptions::default(), sink)
    }

    /// Build the metadata of a declaration.
    ///
    /// Semantic problems are reported to `sink`. Only an unknown declaration
    /// is an error.
    pub fn build_with<M: DeclarationModel + ?Sized>(
        &self,
        model: &M,
        decl: DeclId,
        options: BuildOptions,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<AnnotationMetadata> {
        let target = model
            .declaration(decl)
            .ok_or(BuildError::UnknownDeclaration(decl))?;

        let mut reader = ValueReader::new(model, &self.config);
        if let Some(validator) = self.validator.as_deref() {
            reader = reader.with_validator(validator);
        }
        let mut assembly = Assembly {
            builder: self,
            reader,
            target: decl,
            target_owner: target.declaring_type,
            target_is_annotation_type: target.is_annotation_type(),
            annotations: Members::new(),
            repeated: Members::new(),
        };

        let hierarchy = build_hierarchy(
            model,
            &self.config,
            decl,
            options.inherit_type_annotations,
            options.declared_only,
        );
        for &level in hierarchy.iter().rev() {
            assembly.visit_level(level, sink);
        }

        let metadata = assembly.finish(sink);
        trace!(
            "Metadata of {}: {:?}",
            model.qualified_name(decl),
            metadata.annotation_names()
        );
        Ok(metadata)
    }
}

// ============================================================================
// Assembly State
// ============================================================================

struct PendingEntry {
    source: ValueSource,
    values: Members<AnnotationValue>,
    sources: Members<ValueSource>,
}

struct PendingRepeated {
    container: String,
    instances: Vec<RepeatedInstance>,
}

struct PendingStereotype {
    values: Members<AnnotationValue>,
    parents: Vec<String>,
}

struct Assembly<'a, M: ?Sized> {
    builder: &'a MetadataBuilder,
    reader: ValueReader<'a, M>,
    target: DeclId,
    target_owner: Option<DeclId>,
    target_is_annotation_type: bool,
    annotations: Members<PendingEntry>,
    repeated: Members<PendingRepeated>,
}

impl<'a, M: DeclarationModel + ?Sized> Assembly<'a, M> {
    fn model(&self) -> &'a M {
        self.reader.model()
    }

    fn config(&self) -> &'a BuilderConfig {
        &self.builder.config
    }

    fn visit_level(&mut self, level: DeclId, sink: &mut dyn DiagnosticSink) {
        let model = self.model();
        let source = if level == self.target {
            ValueSource::Declared
        } else {
            ValueSource::Inherited
        };
        let ancestor_type =
            level != self.target && Some(level) != self.target_owner && model.is_type(level);

        for instance in model.annotations(level) {
            let annotation_type = instance.annotation_type.as_str();
            if !self.target_is_annotation_type && self.config().is_excluded_annotation(annotation_type) {
                continue;
            }
            if ancestor_type
                && self.config().require_inherited_marker
                && !self.is_inherited(annotation_type)
            {
                debug!(
                    "@{} on {} is not inherited",
                    annotation_type,
                    model.qualified_name(level)
                );
                continue;
            }

            if let Some(items) = self.container_items(instance) {
                for item in items {
                    self.add_repeated(level, source, item, annotation_type, sink);
                }
                continue;
            }
            if let Some(container) = self.repeatable_container(annotation_type) {
                self.add_repeated(level, source, instance, &container, sink);
                continue;
            }
            self.merge(level, source, instance, sink);
        }
    }

    fn merge(
        &mut self,
        level: DeclId,
        source: ValueSource,
        instance: &AnnotationInstance,
        sink: &mut dyn DiagnosticSink,
    ) {
        let model = self.model();
        let reader = &self.reader;
        let entry = self
            .annotations
            .get_or_insert_with(&instance.annotation_type, || PendingEntry {
                source,
                values: Members::new(),
                sources: Members::new(),
            });

        for (name, expr) in instance.members.iter() {
            let member = model.annotation_member(&instance.annotation_type, name);
            if reader.read_raw_values(
                level,
                &instance.annotation_type,
                member,
                name,
                expr,
                &mut entry.values,
                sink,
            ) {
                entry.sources.insert(name, source);
            }
        }
    }

    fn add_repeated(
        &mut self,
        level: DeclId,
        source: ValueSource,
        instance: &AnnotationInstance,
        container: &str,
        sink: &mut dyn DiagnosticSink,
    ) {
        let values = self.read_instance(level, instance, sink);
        let repeated = self
            .repeated
            .get_or_insert_with(&instance.annotation_type, || PendingRepeated {
                container: container.to_string(),
                instances: Vec::new(),
            });
        repeated.instances.push(RepeatedInstance {
            source,
            values: values.map_values(|value| MemberValue { value, source }),
        });
    }

    fn read_instance(
        &self,
        level: DeclId,
        instance: &AnnotationInstance,
        sink: &mut dyn DiagnosticSink,
    ) -> Members<AnnotationValue> {
        let mut values = Members::new();
        for (name, expr) in instance.members.iter() {
            let member = self
                .model()
                .annotation_member(&instance.annotation_type, name);
            self.reader.read_raw_values(
                level,
                &instance.annotation_type,
                member,
                name,
                expr,
                &mut values,
                sink,
            );
        }
        values
    }

    /// The repeated annotations held by a pure repeatable container.
    ///
    /// A pure container has a single `value` member holding nested
    /// annotations whose type names this container as its repeatable
    /// container. Anything else is kept as a regular annotation.
    fn container_items<'i>(&self, instance: &'i AnnotationInstance) -> Option<Vec<&'i AnnotationInstance>> {
        if instance.members.len() != 1 {
            return None;
        }
        let expr = instance.members.get("value")?;

        let declared_as_array = self
            .model()
            .annotation_member(&instance.annotation_type, "value")
            .and_then(|m| self.model().method_info(m))
            .is_none_or(|info| info.return_type.is_array());
        if !declared_as_array {
            return None;
        }

        let items = nested_instances(expr)?;
        if items.is_empty() {
            return None;
        }
        let pure = items.iter().all(|item| {
            self.repeatable_container(&item.annotation_type).as_deref()
                == Some(instance.annotation_type.as_str())
        });
        pure.then_some(items)
    }

    /// The container type named by an annotation type's repeatable marker.
    fn repeatable_container(&self, annotation_type: &str) -> Option<String> {
        let model = self.model();
        let ty = model.resolve_type(annotation_type)?;
        let marker = model
            .annotations_by_type(ty, &self.config().repeatable_annotation)
            .into_iter()
            .next()?;
        let expr = marker.members.get("value")?;
        match self.reader.read_value(ty, None, "value", expr)? {
            AnnotationValue::Class(class) => Some(class.name),
            AnnotationValue::Str(name) => Some(name),
            _ => None,
        }
    }

    fn is_inherited(&self, annotation_type: &str) -> bool {
        let model = self.model();
        model
            .resolve_type(annotation_type)
            .is_some_and(|ty| {
                !model
                    .annotations_by_type(ty, &self.config().inherited_annotation)
                    .is_empty()
            })
    }

    /// Retention of an annotation type, runtime when it declares none.
    fn retention(&self, annotation_type: &str) -> RetentionPolicy {
        let model = self.model();
        let Some(ty) = model.resolve_type(annotation_type) else {
            return RetentionPolicy::default();
        };
        let Some(marker) = model
            .annotations_by_type(ty, &self.config().retention_annotation)
            .into_iter()
            .next()
        else {
            return RetentionPolicy::default();
        };
        let Some(expr) = marker.members.get("value") else {
            return RetentionPolicy::default();
        };

        let policy = match expr {
            Expr::Qualified { member, .. } => RetentionPolicy::from_name(member),
            other => self
                .reader
                .read_value(ty, None, "value", other)
                .as_ref()
                .and_then(AnnotationValue::as_str)
                .and_then(RetentionPolicy::from_name),
        };
        policy.unwrap_or_else(|| {
            debug!("Unrecognized retention on {}, using runtime", annotation_type);
            RetentionPolicy::default()
        })
    }

    /// Member defaults of an annotation type, empty when it does not resolve.
    fn defaults(&self, annotation_type: &str) -> Arc<Members<AnnotationValue>> {
        match self.model().resolve_type(annotation_type) {
            Some(ty) => self
                .builder
                .defaults
                .read_default_values(&self.reader, annotation_type, ty),
            None => Arc::new(Members::new()),
        }
    }

    fn finish(self, sink: &mut dyn DiagnosticSink) -> AnnotationMetadata {
        let mut metadata = AnnotationMetadata::default();

        for (name, pending) in self.annotations.iter() {
            let mut values: Members<MemberValue> = Members::new();
            for (member, value) in pending.values.iter() {
                let source = pending.sources.get(member).copied().unwrap_or(pending.source);
                values.insert(
                    member,
                    MemberValue {
                        value: value.clone(),
                        source,
                    },
                );
            }
            fill_defaults(&mut values, &self.defaults(name));

            metadata.annotations.insert(
                name,
                AnnotationEntry {
                    annotation_type: name.to_string(),
                    source: pending.source,
                    retention: self.retention(name),
                    values,
                },
            );
        }

        for (name, pending) in self.repeated.iter() {
            let defaults = self.defaults(name);
            let instances = pending
                .instances
                .iter()
                .cloned()
                .map(|mut instance| {
                    fill_defaults(&mut instance.values, &defaults);
                    instance
                })
                .collect();
            metadata.repeated.insert(
                name,
                RepeatedAnnotations {
                    annotation_type: name.to_string(),
                    container: pending.container.clone(),
                    retention: self.retention(name),
                    instances,
                },
            );
        }

        if self.config().stereotypes {
            metadata.stereotypes = self.collect_stereotypes(&metadata, sink);
        }
        metadata
    }

    /// Meta-annotations reachable from the collected annotation types.
    fn collect_stereotypes(
        &self,
        metadata: &AnnotationMetadata,
        sink: &mut dyn DiagnosticSink,
    ) -> Members<StereotypeEntry> {
        let mut pending: Members<PendingStereotype> = Members::new();
        let mut visited: Vec<String> = Vec::new();
        for name in metadata.annotation_names() {
            if !visited.iter().any(|v| v == name) {
                visited.push(name.to_string());
                self.visit_stereotypes(name, &mut visited, &mut pending, sink);
            }
        }

        let mut stereotypes = Members::new();
        for (name, stereotype) in pending.iter() {
            let mut values: Members<MemberValue> = stereotype
                .values
                .clone()
                .map_values(|value| MemberValue {
                    value,
                    source: ValueSource::Stereotype,
                });
            fill_defaults(&mut values, &self.defaults(name));
            stereotypes.insert(
                name,
                StereotypeEntry {
                    entry: AnnotationEntry {
                        annotation_type: name.to_string(),
                        source: ValueSource::Stereotype,
                        retention: self.retention(name),
                        values,
                    },
                    parents: stereotype.parents.clone(),
                },
            );
        }
        stereotypes
    }

    fn visit_stereotypes(
        &self,
        annotation_type: &str,
        visited: &mut Vec<String>,
        pending: &mut Members<PendingStereotype>,
        sink: &mut dyn DiagnosticSink,
    ) {
        let model = self.model();
        let Some(ty) = model.resolve_type(annotation_type) else {
            return;
        };

        for meta in model.annotations(ty) {
            let meta_type = meta.annotation_type.as_str();
            if self.config().is_excluded_annotation(meta_type) {
                continue;
            }

            let mut targeted = TargetedSink {
                target: self.target,
                via: annotation_type,
                inner: &mut *sink,
            };
            let values = self.read_instance(ty, meta, &mut targeted);
            let entry = pending.get_or_insert_with(meta_type, || PendingStereotype {
                values: Members::new(),
                parents: Vec::new(),
            });
            if !entry.parents.iter().any(|p| p == annotation_type) {
                entry.parents.push(annotation_type.to_string());
            }
            for (name, value) in values {
                entry.values.insert_if_absent(name, value);
            }

            if !visited.iter().any(|v| v == meta_type) {
                visited.push(meta_type.to_string());
                self.visit_stereotypes(meta_type, visited, pending, sink);
            }
        }
    }
}

/// Reports problems found on meta-annotations against the declaration being
/// built, so each build reports them once for its own target.
struct TargetedSink<'s> {
    target: DeclId,
    via: &'s str,
    inner: &'s mut dyn DiagnosticSink,
}

impl DiagnosticSink for TargetedSink<'_> {
    fn add_error(&mut self, _declaration: DeclId, message: String) {
        self.inner
            .add_error(self.target, format!("stereotype {}: {}", self.via, message));
    }

    fn add_warning(&mut self, _declaration: DeclId, message: String) {
        self.inner
            .add_warning(self.target, format!("stereotype {}: {}", self.via, message));
    }
}

fn fill_defaults(values: &mut Members<MemberValue>, defaults: &Members<AnnotationValue>) {
    for (member, value) in defaults.iter() {
        if !values.contains(member) {
            values.insert(
                member,
                MemberValue {
                    value: value.clone(),
                    source: ValueSource::Default,
                },
            );
        }
    }
}

/// Nested annotations held by a container's `value` member.
fn nested_instances(expr: &Expr) -> Option<Vec<&AnnotationInstance>> {
    match expr {
        Expr::Annotation(instance) => Some(vec![instance]),
        Expr::List(items) => items
            .iter()
            .map(|item| match item {
                Expr::Annotation(instance) => Some(instance),
                Expr::Value(HostValue::Annotation(instance)) => Some(instance),
                _ => None,
            })
            .collect(),
        Expr::Value(HostValue::Annotation(instance)) => Some(vec![instance]),
        Expr::Value(HostValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                HostValue::Annotation(instance) => Some(instance),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
