//! Override resolution with generics substitution.
//!
//! A method carrying the override marker inherits annotations from the
//! methods it overrides. Matching is by name and parameter types, where an
//! ancestor's type parameters are first bound to the concrete types the
//! overriding method's declaring type supplies for them.

use annolith_types::{DeclId, Substitution, TypeRef, Visibility};
use log::debug;

use crate::config::BuilderConfig;
use crate::hierarchy::interface_closure;
use crate::model::DeclarationModel;

/// Methods overridden by `method`, nearest first.
///
/// Each level of the walk visits the interfaces reachable from the current
/// type before its direct superclass. The class walk ends at the first match
/// that has no override marker of its own, since that method starts the
/// override chain. Private superclass methods never match.
pub fn find_overridden_methods<M: DeclarationModel + ?Sized>(
    model: &M,
    config: &BuilderConfig,
    method: DeclId,
) -> Vec<DeclId> {
    let Some(decl) = model.declaration(method) else {
        return Vec::new();
    };
    let Some(origin) = decl.declaring_type else {
        return Vec::new();
    };
    let params = parameter_types(model, method);

    let mut overridden: Vec<DeclId> = Vec::new();
    let mut seen_interfaces = vec![origin];
    let mut walked = vec![origin];
    let mut current = origin;

    loop {
        for interface in interface_closure(model, config, current, &seen_interfaces) {
            seen_interfaces.push(interface);
            let substitution = generics_substitution(model, origin, interface);
            for candidate in model.methods_named(interface, &decl.name) {
                if candidate != method
                    && !overridden.contains(&candidate)
                    && signature_matches(model, &params, candidate, substitution.as_ref())
                {
                    overridden.push(candidate);
                }
            }
        }

        let Some(superclass) = model.super_type(current) else {
            break;
        };
        if walked.contains(&superclass) {
            break;
        }
        walked.push(superclass);
        let is_root = model
            .declaration(superclass)
            .is_some_and(|d| d.name == config.root_type);
        if is_root {
            break;
        }

        let substitution = generics_substitution(model, origin, superclass);
        let mut chain_root = false;
        for candidate in model.methods_named(superclass, &decl.name) {
            let Some(info) = model.method_info(candidate) else {
                continue;
            };
            if info.visibility == Visibility::Private {
                continue;
            }
            if signature_matches(model, &params, candidate, substitution.as_ref()) {
                if !overridden.contains(&candidate) {
                    overridden.push(candidate);
                }
                chain_root |= !info.overrides;
            }
        }
        if chain_root {
            break;
        }
        current = superclass;
    }

    debug!(
        "{} overrides {:?}",
        model.qualified_name(method),
        overridden
            .iter()
            .map(|&m| model.qualified_name(m))
            .collect::<Vec<_>>()
    );
    overridden
}

/// Bind the type parameters of `ancestor` as seen from `origin`.
///
/// `class UserRepo implements Repo<User>` binds `T` of `Repo<T>` to `User`.
/// Bindings flow through intermediate generic types. Returns `None` when
/// `ancestor` is not reachable from `origin`.
pub fn generics_substitution<M: DeclarationModel + ?Sized>(
    model: &M,
    origin: DeclId,
    ancestor: DeclId,
) -> Option<Substitution> {
    let mut visited = Vec::new();
    bindings_to(model, origin, &Substitution::new(), ancestor, &mut visited)
}

fn bindings_to<M: DeclarationModel + ?Sized>(
    model: &M,
    current: DeclId,
    bindings: &Substitution,
    target: DeclId,
    visited: &mut Vec<DeclId>,
) -> Option<Substitution> {
    if current == target {
        return Some(bindings.clone());
    }
    if visited.contains(&current) {
        return None;
    }
    visited.push(current);

    let info = model.type_info(current)?;
    for parent_ref in info.super_type.iter().chain(info.interfaces.iter()) {
        let TypeRef::Named { name, args } = parent_ref else {
            continue;
        };
        let Some(parent) = model.resolve_type(name) else {
            continue;
        };
        let Some(parent_info) = model.type_info(parent) else {
            continue;
        };

        let parent_bindings: Substitution = parent_info
            .type_params
            .iter()
            .zip(args)
            .map(|(param, arg)| (param.clone(), arg.substitute(bindings)))
            .collect();
        if let Some(found) = bindings_to(model, parent, &parent_bindings, target, visited) {
            return Some(found);
        }
    }
    None
}

/// Whether `candidate` accepts the same parameters as the overriding method.
///
/// Placeholders in the candidate's parameter types must bind to the child's
/// types. A placeholder left unbound is a non-match.
pub fn signature_matches<M: DeclarationModel + ?Sized>(
    model: &M,
    child_params: &[TypeRef],
    candidate: DeclId,
    substitution: Option<&Substitution>,
) -> bool {
    let candidate_params = parameter_types(model, candidate);
    if candidate_params.len() != child_params.len() {
        return false;
    }

    let empty = Substitution::new();
    let bindings = substitution.unwrap_or(&empty);
    candidate_params
        .iter()
        .zip(child_params)
        .all(|(ancestor, child)| {
            if ancestor.has_variables() {
                ancestor.substitute(bindings).erasure_eq(child)
            } else {
                ancestor.erasure_eq(child)
            }
        })
}

fn parameter_types<M: DeclarationModel + ?Sized>(model: &M, method: DeclId) -> Vec<TypeRef> {
    model
        .method_info(method)
        .map(|info| {
            info.parameters
                .iter()
                .filter_map(|&p| model.declaration(p))
                .filter_map(|d| d.parameter_info())
                .map(|p| p.ty.clone())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    #[test]
    fn test_interface_and_superclass() {
        let mut model = jdk_model();
        let api = interface(&mut model, "com.acme.I", &[]);
        let api_m = method(&mut model, api, "m", &[], false);
        let base = class(&mut model, "com.acme.B", None, &[]);
        let base_m = method(&mut model, base, "m", &[], false);
        let leaf = class(&mut model, "com.acme.C", Some("com.acme.B"), &["com.acme.I"]);
        let leaf_m = method(&mut model, leaf, "m", &[], true);
        let config = BuilderConfig::default();

        assert_eq!(
            find_overridden_methods(&model, &config, leaf_m),
            vec![api_m, base_m]
        );
    }

    #[test]
    fn test_class_walk_stops_at_chain_root() {
        let mut model = jdk_model();
        let a = class(&mut model, "com.acme.A", None, &[]);
        let a_run = method(&mut model, a, "run", &[string()], false);
        let b = class(&mut model, "com.acme.B", Some("com.acme.A"), &[]);
        let b_run = method(&mut model, b, "run", &[string()], false);
        let c = class(&mut model, "com.acme.C", Some("com.acme.B"), &[]);
        let c_run = method(&mut model, c, "run", &[string()], true);
        let config = BuilderConfig::default();

        assert_eq!(find_overridden_methods(&model, &config, c_run), vec![b_run]);

        // With a marker on B the walk continues to A
        if let Some(annolith_types::DeclarationKind::Method(info)) =
            model.declaration_mut(b_run).map(|d| &mut d.kind)
        {
            info.overrides = true;
        }
        assert_eq!(
            find_overridden_methods(&model, &config, c_run),
            vec![b_run, a_run]
        );
    }

    #[test]
    fn test_interface_matches_do_not_stop_walk() {
        let mut model = jdk_model();
        let first = interface(&mut model, "com.acme.First", &[]);
        let first_m = method(&mut model, first, "m", &[], false);
        let base = class(&mut model, "com.acme.Base", None, &[]);
        let base_m = method(&mut model, base, "m", &[], true);
        let second = interface(&mut model, "com.acme.Second", &[]);
        let second_m = method(&mut model, second, "m", &[], false);
        let root = class(&mut model, "com.acme.Root", None, &["com.acme.Second"]);
        let root_m = method(&mut model, root, "m", &[], true);
        if let Some(annolith_types::DeclarationKind::Type(info)) =
            model.declaration_mut(base).map(|d| &mut d.kind)
        {
            info.super_type = Some(TypeRef::named("com.acme.Root"));
        }
        let leaf = class(&mut model, "com.acme.Leaf", Some("com.acme.Base"), &["com.acme.First"]);
        let leaf_m = method(&mut model, leaf, "m", &[], true);
        let config = BuilderConfig::default();

        assert_eq!(
            find_overridden_methods(&model, &config, leaf_m),
            vec![first_m, base_m, root_m, second_m]
        );
    }

    #[test]
    fn test_generic_substitution() {
        let mut model = jdk_model();
        let user = TypeRef::named("com.acme.User");
        class(&mut model, "com.acme.User", None, &[]);
        let repo = generic_interface(&mut model, "com.acme.Repo", &["T"], vec![]);
        let save = method(&mut model, repo, "save", &[TypeRef::variable("T")], false);
        let user_repo = generic_class(
            &mut model,
            "com.acme.UserRepo",
            &[],
            None,
            vec![TypeRef::generic("com.acme.Repo", vec![user.clone()])],
        );
        let user_save = method(&mut model, user_repo, "save", &[user.clone()], true);
        let user_save_string = method(&mut model, user_repo, "save", &[string()], true);
        let config = BuilderConfig::default();

        let substitution = generics_substitution(&model, user_repo, repo).unwrap();
        assert_eq!(substitution.get("T"), Some(&user));

        assert_eq!(find_overridden_methods(&model, &config, user_save), vec![save]);
        assert!(find_overridden_methods(&model, &config, user_save_string).is_empty());
    }

    #[test]
    fn test_substitution_through_intermediate_type() {
        let mut model = jdk_model();
        let user = TypeRef::named("com.acme.User");
        let repo = generic_interface(&mut model, "com.acme.Repo", &["T"], vec![]);
        let save = method(&mut model, repo, "save", &[TypeRef::variable("T")], false);
        generic_class(
            &mut model,
            "com.acme.AbstractRepo",
            &["E"],
            None,
            vec![TypeRef::generic("com.acme.Repo", vec![TypeRef::variable("E")])],
        );
        let user_repo = generic_class(
            &mut model,
            "com.acme.UserRepo",
            &[],
            Some(TypeRef::generic("com.acme.AbstractRepo", vec![user.clone()])),
            vec![],
        );
        let user_save = method(&mut model, user_repo, "save", &[user.clone()], true);
        let config = BuilderConfig::default();

        assert_eq!(find_overridden_methods(&model, &config, user_save), vec![save]);
    }

    #[test]
    fn test_unbound_placeholder_is_not_a_match() {
        let mut model = jdk_model();
        let repo = generic_interface(&mut model, "com.acme.Repo", &["T"], vec![]);
        method(&mut model, repo, "save", &[TypeRef::variable("T")], false);
        // Raw use of the generic interface
        let raw = class(&mut model, "com.acme.RawRepo", None, &["com.acme.Repo"]);
        let raw_save = method(&mut model, raw, "save", &[TypeRef::named("com.acme.User")], true);
        let config = BuilderConfig::default();

        assert!(find_overridden_methods(&model, &config, raw_save).is_empty());
    }

    #[test]
    fn test_private_methods() {
        let mut model = jdk_model();
        let contract = interface(&mut model, "com.acme.Contract", &[]);
        let contract_m =
            method_with_visibility(&mut model, contract, "m", &[], false, Visibility::Private);
        let base = class(&mut model, "com.acme.Base", None, &[]);
        method_with_visibility(&mut model, base, "m", &[], false, Visibility::Private);
        let leaf = class(&mut model, "com.acme.Leaf", Some("com.acme.Base"), &["com.acme.Contract"]);
        let leaf_m = method(&mut model, leaf, "m", &[], true);
        let config = BuilderConfig::default();

        assert_eq!(find_overridden_methods(&model, &config, leaf_m), vec![contract_m]);
    }

    #[test]
    fn test_parameter_count_must_match() {
        let mut model = jdk_model();
        let base = class(&mut model, "com.acme.Base", None, &[]);
        method(&mut model, base, "m", &[string(), string()], false);
        let leaf = class(&mut model, "com.acme.Leaf", Some("com.acme.Base"), &[]);
        let leaf_m = method(&mut model, leaf, "m", &[string()], true);
        let config = BuilderConfig::default();

        assert!(find_overridden_methods(&model, &config, leaf_m).is_empty());
    }
}
