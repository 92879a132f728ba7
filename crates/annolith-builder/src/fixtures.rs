//! Declaration models shared by the unit tests.

use annolith_types::{
    DeclId, HostValue, MethodInfo, TypeInfo, TypeKind, TypeRef, Visibility,
};

use crate::model::MemoryModel;

pub const RETENTION: &str = "java.lang.annotation.Retention";
pub const REPEATABLE: &str = "java.lang.annotation.Repeatable";
pub const INHERITED: &str = "java.lang.annotation.Inherited";
pub const RETENTION_POLICY: &str = "java.lang.annotation.RetentionPolicy";

/// A model holding the JVM root type and the standard meta-annotations.
pub fn jdk_model() -> MemoryModel {
    let mut model = MemoryModel::new();
    model.add_type(
        "java.lang.Object",
        TypeInfo {
            resolved: true,
            ..TypeInfo::default()
        },
    );
    model.add_type(
        RETENTION_POLICY,
        TypeInfo {
            type_kind: TypeKind::Enum,
            resolved: true,
            enum_constants: vec!["SOURCE".into(), "CLASS".into(), "RUNTIME".into()],
            ..TypeInfo::default()
        },
    );
    for name in [RETENTION, REPEATABLE, INHERITED] {
        annotation_type(&mut model, name);
    }
    model
}

pub fn class(model: &mut MemoryModel, name: &str, super_type: Option<&str>, interfaces: &[&str]) -> DeclId {
    model.add_type(
        name,
        TypeInfo {
            type_kind: TypeKind::Class,
            super_type: Some(TypeRef::named(super_type.unwrap_or("java.lang.Object"))),
            interfaces: interfaces.iter().map(|i| TypeRef::named(*i)).collect(),
            ..TypeInfo::default()
        },
    )
}

pub fn generic_class(
    model: &mut MemoryModel,
    name: &str,
    type_params: &[&str],
    super_type: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
) -> DeclId {
    model.add_type(
        name,
        TypeInfo {
            type_kind: TypeKind::Class,
            type_params: type_params.iter().map(|p| p.to_string()).collect(),
            super_type: Some(super_type.unwrap_or_else(|| TypeRef::named("java.lang.Object"))),
            interfaces,
            ..TypeInfo::default()
        },
    )
}

pub fn interface(model: &mut MemoryModel, name: &str, extends: &[&str]) -> DeclId {
    generic_interface(model, name, &[], extends.iter().map(|i| TypeRef::named(*i)).collect())
}

pub fn generic_interface(
    model: &mut MemoryModel,
    name: &str,
    type_params: &[&str],
    extends: Vec<TypeRef>,
) -> DeclId {
    model.add_type(
        name,
        TypeInfo {
            type_kind: TypeKind::Interface,
            type_params: type_params.iter().map(|p| p.to_string()).collect(),
            interfaces: extends,
            ..TypeInfo::default()
        },
    )
}

/// A compiled annotation type.
pub fn annotation_type(model: &mut MemoryModel, name: &str) -> DeclId {
    model.add_type(
        name,
        TypeInfo {
            type_kind: TypeKind::Annotation,
            resolved: true,
            ..TypeInfo::default()
        },
    )
}

/// A member of an annotation type with an optional compiled default.
pub fn member(
    model: &mut MemoryModel,
    owner: DeclId,
    name: &str,
    return_type: TypeRef,
    default_value: Option<HostValue>,
) -> DeclId {
    model.add_method(
        owner,
        name,
        MethodInfo {
            return_type,
            default_value,
            ..MethodInfo::default()
        },
    )
}

pub fn method(
    model: &mut MemoryModel,
    owner: DeclId,
    name: &str,
    params: &[TypeRef],
    overrides: bool,
) -> DeclId {
    method_with_visibility(model, owner, name, params, overrides, Visibility::Public)
}

pub fn method_with_visibility(
    model: &mut MemoryModel,
    owner: DeclId,
    name: &str,
    params: &[TypeRef],
    overrides: bool,
    visibility: Visibility,
) -> DeclId {
    let id = model.add_method(
        owner,
        name,
        MethodInfo {
            overrides,
            visibility,
            ..MethodInfo::default()
        },
    );
    for (index, ty) in params.iter().enumerate() {
        model.add_parameter(id, format!("arg{}", index), ty.clone());
    }
    id
}

pub fn string() -> TypeRef {
    TypeRef::named("java.lang.String")
}

pub fn string_array() -> TypeRef {
    TypeRef::array_of(string())
}
