//! The declaration model the builder queries.
//!
//! Hosts expose their compile-time (or reflective) type model through
//! [`DeclarationModel`]. Only two queries are required: looking a declaration
//! up by id, and resolving a fully qualified type name. Everything else the
//! builder needs is derived from those.
//!
//! [`MemoryModel`] is an in-memory arena implementation that can be loaded
//! from JSON or assembled programmatically.

use std::collections::HashMap;
use std::path::Path;

use annolith_types::{
    AnnotationInstance, DeclId, Declaration, DeclarationKind, FieldInfo, MethodInfo,
    ParameterInfo, PropertyInfo, TypeInfo, TypeRef,
};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Read-only access to a host's declarations.
pub trait DeclarationModel {
    /// Look up a declaration by id.
    fn declaration(&self, id: DeclId) -> Option<&Declaration>;

    /// Resolve a fully qualified type name to its declaration.
    fn resolve_type(&self, name: &str) -> Option<DeclId>;

    /// Annotations applied directly to a declaration.
    fn annotations(&self, id: DeclId) -> &[AnnotationInstance] {
        self.declaration(id)
            .map(|d| d.annotations.as_slice())
            .unwrap_or(&[])
    }

    /// Annotations of one type applied directly to a declaration.
    fn annotations_by_type(&self, id: DeclId, annotation_type: &str) -> Vec<&AnnotationInstance> {
        self.annotations(id)
            .iter()
            .filter(|a| a.annotation_type == annotation_type)
            .collect()
    }

    fn has_annotations(&self, id: DeclId) -> bool {
        !self.annotations(id).is_empty()
    }

    fn is_type(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Type(_)))
    }

    fn is_method(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Method(_)))
    }

    fn is_field(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Field(_)))
    }

    fn is_property(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Property(_)))
    }

    fn is_parameter(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Parameter(_)))
    }

    fn is_package(&self, id: DeclId) -> bool {
        matches!(self.declaration(id).map(|d| &d.kind), Some(DeclarationKind::Package))
    }

    fn type_info(&self, id: DeclId) -> Option<&TypeInfo> {
        self.declaration(id).and_then(Declaration::type_info)
    }

    fn method_info(&self, id: DeclId) -> Option<&MethodInfo> {
        self.declaration(id).and_then(Declaration::method_info)
    }

    /// The direct superclass of a type, if it resolves.
    fn super_type(&self, id: DeclId) -> Option<DeclId> {
        self.type_info(id)?
            .super_type
            .as_ref()
            .and_then(TypeRef::raw_name)
            .and_then(|name| self.resolve_type(name))
    }

    /// The directly implemented interfaces of a type that resolve.
    fn interfaces(&self, id: DeclId) -> Vec<DeclId> {
        self.type_info(id)
            .map(|info| {
                info.interfaces
                    .iter()
                    .filter_map(TypeRef::raw_name)
                    .filter_map(|name| self.resolve_type(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Methods with the given name declared on a type.
    fn methods_named(&self, ty: DeclId, name: &str) -> Vec<DeclId> {
        self.type_info(ty)
            .map(|info| {
                info.methods
                    .iter()
                    .copied()
                    .filter(|&m| self.declaration(m).is_some_and(|d| d.name == name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The parameter of a method at a position.
    fn parameter_at(&self, method: DeclId, index: usize) -> Option<DeclId> {
        self.method_info(method)?.parameters.get(index).copied()
    }

    /// The member method of an annotation type.
    fn annotation_member(&self, annotation_type: &str, member: &str) -> Option<DeclId> {
        let ty = self.resolve_type(annotation_type)?;
        self.methods_named(ty, member).into_iter().next()
    }

    /// A static field declared on a type.
    fn static_field(&self, ty: DeclId, name: &str) -> Option<DeclId> {
        self.type_info(ty)?.fields.iter().copied().find(|&f| {
            self.declaration(f).is_some_and(|d| {
                d.name == name && d.field_info().is_some_and(|info| info.is_static)
            })
        })
    }

    /// Name of the type declaring an element.
    fn declaring_type_name(&self, id: DeclId) -> Result<&str, ModelError> {
        let decl = self
            .declaration(id)
            .ok_or(ModelError::UnknownDeclaration(id))?;
        let owner = decl
            .declaring_type
            .ok_or(ModelError::NoDeclaringType(id))?;
        self.declaration(owner)
            .map(|d| d.name.as_str())
            .ok_or(ModelError::DanglingReference {
                from: id,
                to: owner,
            })
    }

    /// A display name unique within the model: `com.foo.Bar`, `com.foo.Bar#run`,
    /// `com.foo.Bar#run/arg`.
    fn qualified_name(&self, id: DeclId) -> String {
        let Some(decl) = self.declaration(id) else {
            return id.to_string();
        };
        match &decl.kind {
            DeclarationKind::Type(_) | DeclarationKind::Package => decl.name.clone(),
            DeclarationKind::Parameter(info) => {
                format!("{}/{}", self.qualified_name(info.method), decl.name)
            }
            DeclarationKind::Method(_)
            | DeclarationKind::Field(_)
            | DeclarationKind::Property(_) => match self.declaring_type_name(id) {
                Ok(owner) => format!("{}#{}", owner, decl.name),
                Err(_) => decl.name.clone(),
            },
        }
    }
}

impl<M: DeclarationModel + ?Sized> DeclarationModel for &M {
    fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        (**self).declaration(id)
    }

    fn resolve_type(&self, name: &str) -> Option<DeclId> {
        (**self).resolve_type(name)
    }
}

// ============================================================================
// In-Memory Model
// ============================================================================

/// An arena of declarations with a type-name index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryModel {
    declarations: Vec<Declaration>,
    #[serde(skip)]
    types_by_name: HashMap<String, DeclId>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from declarations whose ids are their positions.
    pub fn from_declarations(declarations: Vec<Declaration>) -> Result<Self, ModelError> {
        let mut model = Self {
            declarations,
            types_by_name: HashMap::new(),
        };
        model.reindex()?;
        Ok(model)
    }

    /// Parse a model from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let mut model: MemoryModel = serde_json::from_str(json)?;
        model.reindex()?;
        Ok(model)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// All declaration ids, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.declarations.len()).map(DeclId)
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.declarations.get_mut(id.0)
    }

    /// Append a declaration as-is.
    pub fn push(&mut self, declaration: Declaration) -> DeclId {
        let id = DeclId(self.declarations.len());
        if declaration.type_info().is_some() {
            self.types_by_name.insert(declaration.name.clone(), id);
        }
        self.declarations.push(declaration);
        id
    }

    pub fn add_type(&mut self, name: impl Into<String>, info: TypeInfo) -> DeclId {
        self.push(Declaration::new(name, DeclarationKind::Type(info)))
    }

    pub fn add_package(&mut self, name: impl Into<String>) -> DeclId {
        self.push(Declaration::new(name, DeclarationKind::Package))
    }

    /// Add a method to a type, linking it into the type's method list.
    pub fn add_method(&mut self, owner: DeclId, name: impl Into<String>, info: MethodInfo) -> DeclId {
        let mut decl = Declaration::new(name, DeclarationKind::Method(info));
        decl.declaring_type = Some(owner);
        let id = self.push(decl);
        if let Some(DeclarationKind::Type(owner_info)) =
            self.declaration_mut(owner).map(|d| &mut d.kind)
        {
            owner_info.methods.push(id);
        }
        id
    }

    /// Add a field to a type, linking it into the type's field list.
    pub fn add_field(&mut self, owner: DeclId, name: impl Into<String>, info: FieldInfo) -> DeclId {
        let mut decl = Declaration::new(name, DeclarationKind::Field(info));
        decl.declaring_type = Some(owner);
        let id = self.push(decl);
        if let Some(DeclarationKind::Type(owner_info)) =
            self.declaration_mut(owner).map(|d| &mut d.kind)
        {
            owner_info.fields.push(id);
        }
        id
    }

    pub fn add_property(&mut self, owner: DeclId, name: impl Into<String>, ty: TypeRef) -> DeclId {
        let mut decl = Declaration::new(name, DeclarationKind::Property(PropertyInfo { ty }));
        decl.declaring_type = Some(owner);
        self.push(decl)
    }

    /// Append a parameter to a method. The index is its position.
    pub fn add_parameter(&mut self, method: DeclId, name: impl Into<String>, ty: TypeRef) -> DeclId {
        let index = self
            .method_info(method)
            .map(|info| info.parameters.len())
            .unwrap_or(0);
        let owner = self.declaration(method).and_then(|d| d.declaring_type);
        let mut decl = Declaration::new(
            name,
            DeclarationKind::Parameter(ParameterInfo { ty, method, index }),
        );
        decl.declaring_type = owner;
        let id = self.push(decl);
        if let Some(DeclarationKind::Method(info)) =
            self.declaration_mut(method).map(|d| &mut d.kind)
        {
            info.parameters.push(id);
        }
        id
    }

    /// Apply an annotation to a declaration.
    pub fn annotate(&mut self, id: DeclId, annotation: AnnotationInstance) {
        if let Some(decl) = self.declaration_mut(id) {
            decl.annotations.push(annotation);
        }
    }

    /// Rebuild the type index and check every id reference.
    fn reindex(&mut self) -> Result<(), ModelError> {
        self.types_by_name.clear();
        for (index, decl) in self.declarations.iter().enumerate() {
            if decl.type_info().is_some()
                && self
                    .types_by_name
                    .insert(decl.name.clone(), DeclId(index))
                    .is_some()
            {
                return Err(ModelError::DuplicateType(decl.name.clone()));
            }
        }

        for (index, decl) in self.declarations.iter().enumerate() {
            let from = DeclId(index);
            for (to, expected) in referenced_ids(decl) {
                let Some(target) = self.declarations.get(to.0) else {
                    return Err(ModelError::DanglingReference { from, to });
                };
                if target.kind_name() != expected {
                    return Err(ModelError::WrongReferenceKind {
                        from,
                        to,
                        expected,
                        found: target.kind_name(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every id a declaration refers to, with the kind the target must have.
fn referenced_ids(decl: &Declaration) -> Vec<(DeclId, &'static str)> {
    let mut ids: Vec<(DeclId, &'static str)> =
        decl.declaring_type.map(|owner| (owner, "type")).into_iter().collect();
    match &decl.kind {
        DeclarationKind::Type(info) => {
            ids.extend(info.methods.iter().map(|&id| (id, "method")));
            ids.extend(info.fields.iter().map(|&id| (id, "field")));
        }
        DeclarationKind::Method(info) => {
            ids.extend(info.parameters.iter().map(|&id| (id, "parameter")))
        }
        DeclarationKind::Parameter(info) => ids.push((info.method, "method")),
        DeclarationKind::Field(_) | DeclarationKind::Property(_) | DeclarationKind::Package => {}
    }
    ids
}

impl DeclarationModel for MemoryModel {
    fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.0)
    }

    fn resolve_type(&self, name: &str) -> Option<DeclId> {
        self.types_by_name.get(name).copied()
    }
}
