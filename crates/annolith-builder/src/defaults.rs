//! Annotation member defaults, cached per annotation type name.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use annolith_types::{AnnotationValue, DeclId, Expr, Members, Statement};
use log::debug;

use crate::model::DeclarationModel;
use crate::values::ValueReader;

/// Member defaults of annotation types.
///
/// Entries are keyed by the annotation type's fully qualified name, computed
/// on first use and kept for the lifetime of the cache. One cache is meant to
/// live for a build session and be shared by every build in it. Concurrent
/// lookups of the same name may both compute the defaults; the first one
/// stored is kept.
#[derive(Debug, Default)]
pub struct DefaultValueCache {
    entries: RwLock<HashMap<String, Arc<Members<AnnotationValue>>>>,
}

impl DefaultValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults of every member of an annotation type, in declaration order.
    ///
    /// Compiled types provide defaults as host values. Source-only types
    /// provide them as a member body made of a single `return` or expression
    /// statement, and only literal constants are accepted there. An empty
    /// string default counts as no default in both cases.
    pub fn read_default_values<M: DeclarationModel + ?Sized>(
        &self,
        reader: &ValueReader<'_, M>,
        annotation_type_name: &str,
        annotation_type: DeclId,
    ) -> Arc<Members<AnnotationValue>> {
        if let Some(cached) = self.get(annotation_type_name) {
            return cached;
        }

        let computed = Arc::new(compute_defaults(reader, annotation_type_name, annotation_type));
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(annotation_type_name.to_string())
            .or_insert(computed)
            .clone()
    }

    /// Cached defaults, without computing them.
    pub fn get(&self, annotation_type_name: &str) -> Option<Arc<Members<AnnotationValue>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(annotation_type_name)
            .cloned()
    }

    pub fn contains(&self, annotation_type_name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(annotation_type_name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compute_defaults<M: DeclarationModel + ?Sized>(
    reader: &ValueReader<'_, M>,
    annotation_type_name: &str,
    annotation_type: DeclId,
) -> Members<AnnotationValue> {
    let model = reader.model();
    let mut defaults = Members::new();
    let Some(info) = model.type_info(annotation_type) else {
        debug!("{} is not a type, no defaults", annotation_type_name);
        return defaults;
    };

    for &member in &info.methods {
        let Some(decl) = model.declaration(member) else {
            continue;
        };
        let Some(method) = decl.method_info() else {
            continue;
        };

        let value = if info.resolved {
            method
                .default_value
                .as_ref()
                .and_then(|v| reader.read_host_value(v, Some(member)))
        } else {
            source_default(&method.default_body)
                .and_then(|expr| reader.read_value(annotation_type, Some(member), &decl.name, expr))
        };

        match value {
            Some(value) if value.is_empty_str() => {
                debug!(
                    "Empty string default of {}.{} treated as no default",
                    annotation_type_name, decl.name
                );
            }
            Some(value) => {
                defaults.insert(decl.name.as_str(), value);
            }
            None => {}
        }
    }

    debug!(
        "Computed {} default(s) for {}",
        defaults.len(),
        annotation_type_name
    );
    defaults
}

/// The literal returned by a single-statement member body.
fn source_default(body: &[Statement]) -> Option<&Expr> {
    let [statement] = body else {
        return None;
    };
    let expr = match statement {
        Statement::Return { expr: Some(expr) } => expr,
        Statement::Expression { expr } => expr,
        Statement::Return { expr: None } | Statement::Other { .. } => return None,
    };
    matches!(expr, Expr::Literal(_)).then_some(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;
    use crate::fixtures::*;
    use crate::model::MemoryModel;
    use annolith_types::{HostValue, MethodInfo, TypeInfo, TypeKind, TypeRef};

    fn compiled_annotation(model: &mut MemoryModel) -> DeclId {
        let ann = annotation_type(model, "com.acme.Named");
        member(model, ann, "value", string(), Some(HostValue::Str("foo".into())));
        member(model, ann, "alias", string(), Some(HostValue::Str(String::new())));
        member(model, ann, "order", TypeRef::named("int"), Some(HostValue::Int(0)));
        member(
            model,
            ann,
            "type",
            TypeRef::named("java.lang.Class"),
            Some(HostValue::Class(TypeRef::named("java.lang.Object"))),
        );
        member(model, ann, "required", TypeRef::named("boolean"), None);
        ann
    }

    #[test]
    fn test_compiled_defaults() {
        let mut model = jdk_model();
        let ann = compiled_annotation(&mut model);
        let config = BuilderConfig::default();
        let reader = ValueReader::new(&model, &config);
        let cache = DefaultValueCache::new();

        let defaults = cache.read_default_values(&reader, "com.acme.Named", ann);
        assert_eq!(defaults.names().collect::<Vec<_>>(), vec!["value", "order", "type"]);
        assert_eq!(defaults.get("value"), Some(&AnnotationValue::Str("foo".into())));
        // Empty string default is no default
        assert!(!defaults.contains("alias"));
        assert_eq!(
            defaults.get("type").and_then(AnnotationValue::as_str),
            Some("java.lang.Object")
        );
    }

    #[test]
    fn test_source_defaults() {
        let mut model = jdk_model();
        let ann = model.add_type(
            "com.acme.Draft",
            TypeInfo {
                type_kind: TypeKind::Annotation,
                resolved: false,
                ..TypeInfo::default()
            },
        );
        let body = |statements: Vec<Statement>| MethodInfo {
            return_type: string(),
            default_body: statements,
            ..MethodInfo::default()
        };
        model.add_method(
            ann,
            "value",
            body(vec![Statement::Return {
                expr: Some(Expr::str("draft")),
            }]),
        );
        model.add_method(ann, "limit", body(vec![Statement::Expression { expr: Expr::int(5) }]));
        model.add_method(
            ann,
            "empty",
            body(vec![Statement::Return {
                expr: Some(Expr::str("")),
            }]),
        );
        model.add_method(
            ann,
            "computed",
            body(vec![Statement::Return {
                expr: Some(Expr::qualified("com.acme.Constants", "NAME")),
            }]),
        );
        model.add_method(
            ann,
            "block",
            body(vec![
                Statement::Other {
                    source: "int x = 1".into(),
                },
                Statement::Return {
                    expr: Some(Expr::int(1)),
                },
            ]),
        );

        let config = BuilderConfig::default();
        let reader = ValueReader::new(&model, &config);
        let cache = DefaultValueCache::new();
        let defaults = cache.read_default_values(&reader, "com.acme.Draft", ann);

        assert_eq!(defaults.names().collect::<Vec<_>>(), vec!["value", "limit"]);
        assert_eq!(defaults.get("limit"), Some(&AnnotationValue::Int(5)));
    }

    #[test]
    fn test_lookups_are_cached_by_name() {
        let mut model = jdk_model();
        let ann = compiled_annotation(&mut model);
        let config = BuilderConfig::default();
        let reader = ValueReader::new(&model, &config);
        let cache = DefaultValueCache::new();
        assert!(cache.is_empty());

        let first = cache.read_default_values(&reader, "com.acme.Named", ann);
        let second = cache.read_default_values(&reader, "com.acme.Named", ann);
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("com.acme.Named"));
        assert!(cache.get("com.acme.Other").is_none());
    }

    #[test]
    fn test_shared_across_threads() {
        let mut model = jdk_model();
        let ann = compiled_annotation(&mut model);
        let config = BuilderConfig::default();
        let cache = DefaultValueCache::new();

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let reader = ValueReader::new(&model, &config);
                        cache.read_default_values(&reader, "com.acme.Named", ann)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        let stored = cache.get("com.acme.Named").unwrap();
        assert!(results.iter().all(|r| **r == *stored));
    }
}
