//! Hierarchy linearization.
//!
//! Annotation lookup walks an ordered list of declarations: the outermost
//! ancestor first and the declaration itself last. When several levels set
//! the same member, the level closest to the end of the list wins.
//!
//! Every function here returns a fresh vector; callers concatenate.

use annolith_types::{DeclId, DeclarationKind};
use log::{debug, trace};

use crate::config::BuilderConfig;
use crate::model::DeclarationModel;
use crate::overrides::find_overridden_methods;

/// Linearize the hierarchy of any declaration.
///
/// * `inherit_type_annotations` - for methods, prepend the declaring type's hierarchy
/// * `declared_only` - return just the declaration itself
pub fn build_hierarchy<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    node: DeclId,
    inherit_type_annotations: bool,
    declared_only: bool,
) -> Vec<DeclId> {
    let Some(decl) = model.declaration(node) else {
        return Vec::new();
    };

    if declared_only {
        return vec![node];
    }

    let hierarchy = match &decl.kind {
        DeclarationKind::Type(_) => type_hierarchy(model, config, node),
        DeclarationKind::Method(info) => {
            let mut hierarchy = Vec::new();
            if inherit_type_annotations {
                if let Some(owner) = decl.declaring_type {
                    hierarchy.extend(build_hierarchy(model, config, owner, false, false));
                }
            }
            if info.overrides {
                hierarchy.extend(find_overridden_methods(model, config, node));
            }
            hierarchy.push(node);
            hierarchy
        }
        DeclarationKind::Parameter(info) => {
            let overrides = model
                .method_info(info.method)
                .is_some_and(|method| method.overrides);
            let mut hierarchy = Vec::new();
            if overrides {
                hierarchy.extend(
                    find_overridden_methods(model, config, info.method)
                        .into_iter()
                        .filter_map(|method| model.parameter_at(method, info.index)),
                );
            }
            hierarchy.push(node);
            hierarchy
        }
        DeclarationKind::Field(_) | DeclarationKind::Property(_) | DeclarationKind::Package => {
            vec![node]
        }
    };

    trace!(
        "Hierarchy of {}: {:?}",
        model.qualified_name(node),
        hierarchy
            .iter()
            .map(|&id| model.qualified_name(id))
            .collect::<Vec<_>>()
    );
    hierarchy
}

/// The type followed by its ancestors, reversed: outermost ancestor first.
///
/// Annotation types stop at themselves.
pub fn type_hierarchy<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    ty: DeclId,
) -> Vec<DeclId> {
    let is_annotation_type = model
        .declaration(ty)
        .is_some_and(|d| d.is_annotation_type());
    if is_annotation_type {
        return vec![ty];
    }

    let mut hierarchy = vec![ty];
    hierarchy.extend(type_ancestors(model, config, ty));
    hierarchy.reverse();
    hierarchy
}

/// Ancestors of a type, nearest first: every interface reachable from the
/// type itself, then each surviving superclass followed by its interfaces.
///
/// The root type and ignored base classes are skipped, but the walk
/// continues past them.
pub fn type_ancestors<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    ty: DeclId,
) -> Vec<DeclId> {
    let mut ancestors = interface_closure(model, config, ty, &[ty]);
    let mut walked = vec![ty];
    let mut current = ty;

    while let Some(superclass) = resolved_super_type(model, current) {
        if walked.contains(&superclass) {
            debug!(
                "Superclass cycle through {}, stopping",
                model.qualified_name(superclass)
            );
            break;
        }
        walked.push(superclass);

        let name = model
            .declaration(superclass)
            .map(|d| d.name.as_str())
            .unwrap_or_default();
        if !config.is_ignored_base(name) {
            if !ancestors.contains(&superclass) {
                ancestors.push(superclass);
            }
            let seen: Vec<DeclId> = std::iter::once(ty).chain(ancestors.iter().copied()).collect();
            ancestors.extend(interface_closure(model, config, superclass, &seen));
        }
        current = superclass;
    }

    ancestors
}

/// Every interface reachable from `ty` that is not in `seen`, depth first.
pub fn interface_closure<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    ty: DeclId,
    seen: &[DeclId],
) -> Vec<DeclId> {
    let mut found: Vec<DeclId> = Vec::new();
    for interface in resolved_interfaces(model, config, ty) {
        if seen.contains(&interface) || found.contains(&interface) {
            continue;
        }
        found.push(interface);

        let known: Vec<DeclId> = seen.iter().chain(found.iter()).copied().collect();
        let nested = interface_closure(model, config, interface, &known);
        found.extend(nested);
    }
    found
}

fn resolved_super_type<M: DeclarationModel + ?Sized>(model: &M, ty: DeclId) -> Option<DeclId> {
    let info = model.type_info(ty)?;
    let super_ref = info.super_type.as_ref()?;
    let resolved = model.super_type(ty);
    if resolved.is_none() {
        debug!(
            "Superclass {} of {} does not resolve, skipping",
            super_ref,
            model.qualified_name(ty)
        );
    }
    resolved
}

fn resolved_interfaces<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    ty: DeclId,
) -> Vec<DeclId> {
    let Some(info) = model.type_info(ty) else {
        return Vec::new();
    };

    info.interfaces
        .iter()
        .filter_map(|interface| {
            let name = interface.raw_name()?;
            if config.is_ignored_interface(name) {
                return None;
            }
            let resolved = model.resolve_type(name);
            if resolved.is_none() {
                debug!(
                    "Interface {} of {} does not resolve, skipping",
                    name,
                    model.qualified_name(ty)
                );
            }
            resolved
        })
        .collect()
}
