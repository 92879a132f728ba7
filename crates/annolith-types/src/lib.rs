//! Shared types for the Annolith annotation metadata builder.
//!
//! This crate defines the declaration model a host hands to the builder, the
//! raw annotation value expressions found on declarations, and the canonical
//! metadata produced for each declaration.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Ordered Member Maps
// ============================================================================

/// A single named entry of a [`Members`] map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member<V> {
    pub name: String,
    pub value: V,
}

/// An insertion-ordered map from member name to value.
///
/// Annotation members are few, so lookups scan a vector. Names are unique:
/// inserting an existing name replaces the value in place, also when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Members<V> {
    entries: Vec<Member<V>>,
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Members<V> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Member<V>>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|m| (m.name, m.value)).collect())
    }
}

impl<V> Default for Members<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> Members<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|m| m.name == name)
            .map(|m| &mut m.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|m| m.name == name)
    }

    /// Insert a value, returning the previous value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        if let Some(index) = self.entries.iter().position(|m| m.name == name) {
            return Some(std::mem::replace(&mut self.entries[index].value, value));
        }
        self.entries.push(Member { name, value });
        None
    }

    /// Insert a value only when the name is not present yet.
    ///
    /// Returns `true` when the value was inserted.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: V) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push(Member { name, value });
        true
    }

    /// Get the value for `name`, inserting one built by `init` first if absent.
    pub fn get_or_insert_with(&mut self, name: &str, init: impl FnOnce() -> V) -> &mut V {
        let index = match self.entries.iter().position(|m| m.name == name) {
            Some(index) => index,
            None => {
                self.entries.push(Member {
                    name: name.to_string(),
                    value: init(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].value
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|m| (m.name.as_str(), &m.value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|m| m.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|m| &m.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|m| &mut m.value)
    }

    /// Transform every value, keeping names and order.
    pub fn map_values<U>(self, mut f: impl FnMut(V) -> U) -> Members<U> {
        Members {
            entries: self
                .entries
                .into_iter()
                .map(|m| Member {
                    name: m.name,
                    value: f(m.value),
                })
                .collect(),
        }
    }
}

impl<V> FromIterator<(String, V)> for Members<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut members = Members::new();
        for (name, value) in iter {
            members.insert(name, value);
        }
        members
    }
}

impl<V> IntoIterator for Members<V> {
    type Item = (String, V);
    type IntoIter = std::iter::Map<std::vec::IntoIter<Member<V>>, fn(Member<V>) -> (String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        fn split<V>(member: Member<V>) -> (String, V) {
            (member.name, member.value)
        }
        self.entries
            .into_iter()
            .map(split::<V> as fn(Member<V>) -> (String, V))
    }
}

// ============================================================================
// Declaration Model
// ============================================================================

/// Index of a declaration inside a declaration model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub usize);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named program element: type, method, field, property, parameter or package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Simple name for members, fully qualified name for types and packages
    pub name: String,
    /// The type declaring this element (None for top-level types and packages)
    #[serde(default)]
    pub declaring_type: Option<DeclId>,
    /// Annotations applied directly to this element, in source order
    #[serde(default)]
    pub annotations: Vec<AnnotationInstance>,
    /// What kind of element this is
    pub kind: DeclarationKind,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind) -> Self {
        Self {
            name: name.into(),
            declaring_type: None,
            annotations: Vec::new(),
            kind,
        }
    }

    /// Short human readable name of the declaration kind.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclarationKind::Type(_) => "type",
            DeclarationKind::Method(_) => "method",
            DeclarationKind::Field(_) => "field",
            DeclarationKind::Property(_) => "property",
            DeclarationKind::Parameter(_) => "parameter",
            DeclarationKind::Package => "package",
        }
    }

    pub fn type_info(&self) -> Option<&TypeInfo> {
        match &self.kind {
            DeclarationKind::Type(info) => Some(info),
            _ => None,
        }
    }

    pub fn method_info(&self) -> Option<&MethodInfo> {
        match &self.kind {
            DeclarationKind::Method(info) => Some(info),
            _ => None,
        }
    }

    pub fn field_info(&self) -> Option<&FieldInfo> {
        match &self.kind {
            DeclarationKind::Field(info) => Some(info),
            _ => None,
        }
    }

    pub fn parameter_info(&self) -> Option<&ParameterInfo> {
        match &self.kind {
            DeclarationKind::Parameter(info) => Some(info),
            _ => None,
        }
    }

    /// Whether this declares an annotation type.
    pub fn is_annotation_type(&self) -> bool {
        matches!(
            &self.kind,
            DeclarationKind::Type(TypeInfo {
                type_kind: TypeKind::Annotation,
                ..
            })
        )
    }
}

/// The kind of a declaration, carrying kind-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "info", rename_all = "snake_case")]
pub enum DeclarationKind {
    Type(TypeInfo),
    Method(MethodInfo),
    Field(FieldInfo),
    Property(PropertyInfo),
    Parameter(ParameterInfo),
    Package,
}

/// The kind of a type declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Enum,
    Annotation,
}

/// Visibility of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

/// Type-specific declaration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeInfo {
    pub type_kind: TypeKind,
    /// Declared type parameter names, in order
    pub type_params: Vec<String>,
    /// Direct superclass (None for interfaces and the root type)
    pub super_type: Option<TypeRef>,
    /// Directly implemented or extended interfaces
    pub interfaces: Vec<TypeRef>,
    /// Declared methods (annotation members for annotation types)
    pub methods: Vec<DeclId>,
    /// Declared fields
    pub fields: Vec<DeclId>,
    /// Whether the type is compiled/available rather than source-only
    pub resolved: bool,
    /// Constant names for enum types
    pub enum_constants: Vec<String>,
}

/// Method-specific declaration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodInfo {
    pub parameters: Vec<DeclId>,
    pub return_type: TypeRef,
    pub visibility: Visibility,
    /// Explicit override marker
    pub overrides: bool,
    /// Default value of an annotation member on a resolved annotation type
    pub default_value: Option<HostValue>,
    /// Body of an annotation member on a source-only annotation type
    pub default_body: Vec<Statement>,
}

/// Field-specific declaration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldInfo {
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Compiled constant value
    pub constant_value: Option<HostValue>,
    /// Source initializer expression
    pub initializer: Option<Expr>,
}

/// Property-specific declaration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyInfo {
    pub ty: TypeRef,
}

/// Parameter-specific declaration data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub ty: TypeRef,
    /// The owning method
    pub method: DeclId,
    /// Position within the owning method's parameter list
    pub index: usize,
}

/// A statement of a source-only annotation member body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Statement {
    Return { expr: Option<Expr> },
    Expression { expr: Expr },
    Other { source: String },
}

// ============================================================================
// Type References
// ============================================================================

/// A reference to a type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeRef {
    /// A named type with optional type arguments (e.g. `java.util.List<T>`)
    Named {
        name: String,
        #[serde(default)]
        args: Vec<TypeRef>,
    },
    /// A generic placeholder (e.g. `T`)
    Variable { name: String },
    /// An array of the component type
    Array { component: Box<TypeRef> },
}

impl Default for TypeRef {
    fn default() -> Self {
        TypeRef::named("void")
    }
}

/// Mapping from type parameter name to the concrete type bound to it.
pub type Substitution = HashMap<String, TypeRef>;

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        TypeRef::Variable { name: name.into() }
    }

    pub fn array_of(component: TypeRef) -> Self {
        TypeRef::Array {
            component: Box::new(component),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array { .. })
    }

    /// The name of a named type, ignoring type arguments.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether a generic placeholder occurs anywhere in this type.
    pub fn has_variables(&self) -> bool {
        match self {
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::has_variables),
            TypeRef::Variable { .. } => true,
            TypeRef::Array { component } => component.has_variables(),
        }
    }

    /// Compare two types after erasing type arguments.
    pub fn erasure_eq(&self, other: &TypeRef) -> bool {
        match (self, other) {
            (TypeRef::Named { name: a, .. }, TypeRef::Named { name: b, .. }) => a == b,
            (TypeRef::Variable { name: a }, TypeRef::Variable { name: b }) => a == b,
            (TypeRef::Array { component: a }, TypeRef::Array { component: b }) => a.erasure_eq(b),
            _ => false,
        }
    }

    /// Replace bound placeholders by the types they are bound to.
    pub fn substitute(&self, bindings: &Substitution) -> TypeRef {
        match self {
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRef::Variable { name } => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Array { component } => TypeRef::array_of(component.substitute(bindings)),
        }
    }

    /// Binary style name: `com.foo.Bar` or `[Lcom.foo.Bar;` for arrays.
    pub fn binary_name(&self) -> String {
        match self {
            TypeRef::Named { name, .. } => name.clone(),
            TypeRef::Variable { name } => name.clone(),
            TypeRef::Array { component } => match component.as_ref() {
                TypeRef::Array { .. } => format!("[{}", component.binary_name()),
                other => format!("[L{};", other.binary_name()),
            },
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } if args.is_empty() => write!(f, "{}", name),
            TypeRef::Named { name, args } => {
                write!(f, "{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::Variable { name } => write!(f, "{}", name),
            TypeRef::Array { component } => write!(f, "{}[]", component),
        }
    }
}

// ============================================================================
// Raw Annotation Values
// ============================================================================

/// One applied annotation occurrence with its raw member expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationInstance {
    /// Fully qualified annotation type name
    pub annotation_type: String,
    /// Member name to raw value expression, in source order
    #[serde(default)]
    pub members: Members<Expr>,
}

impl AnnotationInstance {
    pub fn new(annotation_type: impl Into<String>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            members: Members::new(),
        }
    }

    /// Add a member expression (builder style).
    pub fn with(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.members.insert(name, value);
        self
    }
}

/// A literal constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Null,
}

/// A raw annotation member expression as found in a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", content = "value", rename_all = "snake_case")]
pub enum Expr {
    /// A literal constant
    Literal(Literal),
    /// A constant wrapping a nested annotation
    Annotation(AnnotationInstance),
    /// A qualified reference such as `Type.CONSTANT`
    Qualified { owner: String, member: String },
    /// A type literal such as `Foo.class`
    TypeLiteral(TypeRef),
    /// A list or array literal
    List(Vec<Expr>),
    /// A reference to a named variable and its initializer, when known
    Variable {
        name: String,
        #[serde(default)]
        initializer: Option<Box<Expr>>,
    },
    /// A value the host already resolved
    Value(HostValue),
    /// Any expression the builder does not understand
    Unsupported(String),
}

impl Expr {
    pub fn str(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn class(name: impl Into<String>) -> Self {
        Expr::TypeLiteral(TypeRef::named(name))
    }

    pub fn qualified(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Expr::Qualified {
            owner: owner.into(),
            member: member.into(),
        }
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List(items)
    }

    pub fn annotation(instance: AnnotationInstance) -> Self {
        Expr::Annotation(instance)
    }
}

/// A value resolved by the host, e.g. a compiled default or constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HostValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Class(TypeRef),
    Enum { type_name: String, constant: String },
    Annotation(AnnotationInstance),
    Array(Vec<HostValue>),
}

// ============================================================================
// Canonical Values
// ============================================================================

/// A class reference in binary style (`com.foo.Bar`, `[Lcom.foo.Bar;`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub name: String,
}

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&TypeRef> for ClassRef {
    fn from(ty: &TypeRef) -> Self {
        ClassRef::new(ty.binary_name())
    }
}

/// The element kind of a [`ValueList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    String,
    Int,
    Float,
    Bool,
    Char,
    Enum,
    Class,
    Annotation,
    /// Nothing was converted, so nothing is known
    Unknown,
}

/// A homogeneous ordered list of canonical values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueList {
    pub component: ComponentType,
    pub items: Vec<AnnotationValue>,
}

impl ValueList {
    pub fn empty() -> Self {
        Self {
            component: ComponentType::Unknown,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// String views of the items (strings, enum constants and class names).
    pub fn strings(&self) -> Vec<&str> {
        self.items.iter().filter_map(AnnotationValue::as_str).collect()
    }
}

/// A nested annotation value with converted members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedAnnotation {
    pub annotation_type: String,
    #[serde(default)]
    pub values: Members<AnnotationValue>,
}

impl NestedAnnotation {
    pub fn new(annotation_type: impl Into<String>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            values: Members::new(),
        }
    }

    pub fn value(&self, member: &str) -> Option<&AnnotationValue> {
        self.values.get(member)
    }

    pub fn string_value(&self, member: &str) -> Option<&str> {
        self.value(member).and_then(AnnotationValue::as_str)
    }
}

/// The resolved, host-neutral value of one annotation member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Enum { type_name: String, constant: String },
    Class(ClassRef),
    Annotation(NestedAnnotation),
    List(ValueList),
}

impl AnnotationValue {
    /// The list component kind this value contributes.
    pub fn component_type(&self) -> ComponentType {
        match self {
            AnnotationValue::Str(_) => ComponentType::String,
            AnnotationValue::Int(_) => ComponentType::Int,
            AnnotationValue::Float(_) => ComponentType::Float,
            AnnotationValue::Bool(_) => ComponentType::Bool,
            AnnotationValue::Char(_) => ComponentType::Char,
            AnnotationValue::Enum { .. } => ComponentType::Enum,
            AnnotationValue::Class(_) => ComponentType::Class,
            AnnotationValue::Annotation(_) => ComponentType::Annotation,
            AnnotationValue::List(list) => list.component,
        }
    }

    /// String view: strings, enum constant names and class names.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(s) => Some(s),
            AnnotationValue::Enum { constant, .. } => Some(constant),
            AnnotationValue::Class(class) => Some(&class.name),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ValueList> {
        match self {
            AnnotationValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&NestedAnnotation> {
        match self {
            AnnotationValue::Annotation(nested) => Some(nested),
            _ => None,
        }
    }

    /// Whether this is the empty string.
    pub fn is_empty_str(&self) -> bool {
        matches!(self, AnnotationValue::Str(s) if s.is_empty())
    }
}

// ============================================================================
// Assembled Metadata
// ============================================================================

/// Where a value in the assembled metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Declared on the declaration itself
    Declared,
    /// Declared on an ancestor in the hierarchy
    Inherited,
    /// Filled from the annotation type's member default
    Default,
    /// Declared on an annotation type reached through another annotation
    Stereotype,
}

/// Whether annotation metadata must be available at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    Source,
    Class,
    /// Used whenever no explicit retention marker is found
    #[default]
    Runtime,
}

impl RetentionPolicy {
    /// Parse a retention constant name (`SOURCE`, `CLASS`, `RUNTIME`, or a
    /// qualified form like `RetentionPolicy.RUNTIME`).
    pub fn from_name(name: &str) -> Option<Self> {
        let constant = name.rsplit('.').next().unwrap_or(name);
        match constant.to_ascii_uppercase().as_str() {
            "SOURCE" => Some(RetentionPolicy::Source),
            "CLASS" | "BINARY" => Some(RetentionPolicy::Class),
            "RUNTIME" => Some(RetentionPolicy::Runtime),
            _ => None,
        }
    }
}

/// A member value together with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberValue {
    pub value: AnnotationValue,
    pub source: ValueSource,
}

/// Merged values of one (non-repeated) annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub annotation_type: String,
    /// Declared when found on the declaration itself, Inherited otherwise
    pub source: ValueSource,
    pub retention: RetentionPolicy,
    pub values: Members<MemberValue>,
}

impl AnnotationEntry {
    pub fn value(&self, member: &str) -> Option<&AnnotationValue> {
        self.values.get(member).map(|m| &m.value)
    }

    pub fn value_source(&self, member: &str) -> Option<ValueSource> {
        self.values.get(member).map(|m| m.source)
    }

    /// Convert into a plain nested annotation value.
    pub fn to_nested(&self) -> NestedAnnotation {
        NestedAnnotation {
            annotation_type: self.annotation_type.clone(),
            values: self.values.clone().map_values(|m| m.value),
        }
    }
}

/// One application of a repeatable annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedInstance {
    pub source: ValueSource,
    pub values: Members<MemberValue>,
}

/// All applications of one repeatable annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatedAnnotations {
    pub annotation_type: String,
    /// The container annotation type declared by `@Repeatable`
    pub container: String,
    pub retention: RetentionPolicy,
    pub instances: Vec<RepeatedInstance>,
}

/// A meta-annotation reached through an annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereotypeEntry {
    pub entry: AnnotationEntry,
    /// Annotation types that carry this stereotype
    pub parents: Vec<String>,
}

/// The assembled annotation metadata of one declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMetadata {
    /// Non-repeated annotations, merged over the hierarchy
    pub annotations: Members<AnnotationEntry>,
    /// Repeatable annotations, keyed by the repeatable (not container) type
    pub repeated: Members<RepeatedAnnotations>,
    /// Meta-annotations of the collected annotations
    pub stereotypes: Members<StereotypeEntry>,
}

impl AnnotationMetadata {
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.repeated.is_empty() && self.stereotypes.is_empty()
    }

    /// Whether the annotation (or a repeatable container of it) is present.
    pub fn has_annotation(&self, annotation_type: &str) -> bool {
        self.annotations.contains(annotation_type)
            || self.repeated.contains(annotation_type)
            || self.is_repeatable_container(annotation_type)
    }

    /// Whether the annotation is declared directly on the declaration.
    pub fn has_declared_annotation(&self, annotation_type: &str) -> bool {
        if let Some(entry) = self.annotations.get(annotation_type) {
            return entry.source == ValueSource::Declared;
        }
        self.repeated.values().any(|r| {
            (r.annotation_type == annotation_type || r.container == annotation_type)
                && r.instances.iter().any(|i| i.source == ValueSource::Declared)
        })
    }

    /// Whether the annotation is present directly or as a stereotype.
    pub fn has_stereotype(&self, annotation_type: &str) -> bool {
        self.has_annotation(annotation_type) || self.stereotypes.contains(annotation_type)
    }

    /// Merged member values of an annotation or stereotype.
    pub fn values(&self, annotation_type: &str) -> Option<&Members<MemberValue>> {
        self.entry(annotation_type).map(|e| &e.values)
    }

    /// The merged entry of an annotation, falling back to stereotypes.
    pub fn entry(&self, annotation_type: &str) -> Option<&AnnotationEntry> {
        self.annotations
            .get(annotation_type)
            .or_else(|| self.stereotypes.get(annotation_type).map(|s| &s.entry))
    }

    pub fn value(&self, annotation_type: &str, member: &str) -> Option<&AnnotationValue> {
        self.entry(annotation_type).and_then(|e| e.value(member))
    }

    pub fn string_value(&self, annotation_type: &str, member: &str) -> Option<&str> {
        self.value(annotation_type, member)
            .and_then(AnnotationValue::as_str)
    }

    /// All instances of an annotation type.
    ///
    /// Repeatable annotations yield one value per application. Asking for a
    /// container yields the synthesized container holding those values.
    pub fn annotations_for_type(&self, annotation_type: &str) -> Vec<NestedAnnotation> {
        if let Some(repeated) = self.repeated.get(annotation_type) {
            return repeated
                .instances
                .iter()
                .map(|instance| NestedAnnotation {
                    annotation_type: repeated.annotation_type.clone(),
                    values: instance.values.clone().map_values(|m| m.value),
                })
                .collect();
        }

        if let Some(repeated) = self
            .repeated
            .values()
            .find(|r| r.container == annotation_type)
        {
            let items = self.annotations_for_type(&repeated.annotation_type);
            let mut container = NestedAnnotation::new(annotation_type);
            container.values.insert(
                "value",
                AnnotationValue::List(ValueList {
                    component: ComponentType::Annotation,
                    items: items.into_iter().map(AnnotationValue::Annotation).collect(),
                }),
            );
            return vec![container];
        }

        self.entry(annotation_type)
            .map(|e| vec![e.to_nested()])
            .unwrap_or_default()
    }

    pub fn retention(&self, annotation_type: &str) -> Option<RetentionPolicy> {
        if let Some(entry) = self.entry(annotation_type) {
            return Some(entry.retention);
        }
        self.repeated.get(annotation_type).map(|r| r.retention)
    }

    /// Whether the name is the container of a collected repeatable annotation.
    pub fn is_repeatable_container(&self, annotation_type: &str) -> bool {
        self.repeated.values().any(|r| r.container == annotation_type)
    }

    /// Names of all collected annotations (not stereotypes).
    pub fn annotation_names(&self) -> Vec<&str> {
        self.annotations
            .names()
            .chain(self.repeated.names())
            .collect()
    }

    /// Names of annotations declared directly on the declaration.
    pub fn declared_annotation_names(&self) -> Vec<&str> {
        self.annotation_names()
            .into_iter()
            .filter(|name| self.has_declared_annotation(name))
            .collect()
    }

    pub fn stereotype_names(&self) -> Vec<&str> {
        self.stereotypes.names().collect()
    }
}

// ============================================================================
// Pattern Matching for Qualified Names
// ============================================================================

/// Check if a dotted qualified name matches a pattern.
/// Supports:
/// - Exact match: "com.foo.Bar"
/// - Glob suffix: "com.foo.*"
/// - Recursive glob: "com.foo.**"
/// - Wildcards: "com.foo.Bar*"
pub fn name_matches_pattern(name: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    let name = name.trim();

    // Recursive glob: com.** matches com.foo.Bar
    if let Some(prefix) = pattern.strip_suffix(".**") {
        return name == prefix || name.starts_with(&format!("{}.", prefix));
    }

    // Single level glob: com.foo.* matches com.foo.Bar but not com.foo.bar.Baz
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return match name.strip_prefix(&format!("{}.", prefix)) {
            Some(suffix) => !suffix.contains('.'),
            None => false,
        };
    }

    if pattern == "*" || pattern == "**" {
        return true;
    }

    // Wildcard in name: com.foo.Bar* matches com.foo.BarBaz
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() != 2 {
            return false; // Only a single wildcard is supported
        }
        return name.len() >= parts[0].len() + parts[1].len()
            && name.starts_with(parts[0])
            && name.ends_with(parts[1]);
    }

    name == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matching() {
        // Exact match
        assert!(name_matches_pattern("com.foo.Bar", "com.foo.Bar"));
        assert!(!name_matches_pattern("com.foo.Baz", "com.foo.Bar"));

        // Single level glob
        assert!(name_matches_pattern(
            "java.lang.annotation.Retention",
            "java.lang.annotation.*"
        ));
        assert!(!name_matches_pattern("java.lang.Override", "java.lang.annotation.*"));
        assert!(!name_matches_pattern("com.foo.bar.Baz", "com.foo.*"));

        // Recursive glob
        assert!(name_matches_pattern("com.foo", "com.foo.**"));
        assert!(name_matches_pattern("com.foo.bar.Baz", "com.foo.**"));
        assert!(!name_matches_pattern("com.food.Bar", "com.foo.**"));

        // Wildcard
        assert!(name_matches_pattern("com.foo.BarBaz", "com.foo.Bar*"));
        assert!(name_matches_pattern("com.foo.Bar", "com.foo.Bar*"));
        assert!(!name_matches_pattern("com.foo.Baz", "com.foo.Bar*"));
        assert!(name_matches_pattern("anything.at.All", "*"));
    }

    #[test]
    fn test_members_deserialize_with_unique_names() {
        let json = r#"[{"name":"a","value":1},{"name":"b","value":2},{"name":"a","value":3}]"#;
        let members: Members<i64> = serde_json::from_str(json).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(members.get("a"), Some(&3));
    }

    #[test]
    fn test_members_preserve_insertion_order() {
        let mut members = Members::new();
        members.insert("zeta", 1);
        members.insert("alpha", 2);
        members.insert("mid", 3);
        assert_eq!(members.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);

        // Replacing keeps the original position
        assert_eq!(members.insert("zeta", 10), Some(1));
        assert_eq!(members.names().next(), Some("zeta"));
        assert_eq!(members.get("zeta"), Some(&10));

        assert!(!members.insert_if_absent("alpha", 20));
        assert_eq!(members.get("alpha"), Some(&2));
        assert!(members.insert_if_absent("omega", 4));
        assert_eq!(members.len(), 4);
    }

    #[test]
    fn test_binary_names() {
        let string = TypeRef::named("java.lang.String");
        assert_eq!(string.binary_name(), "java.lang.String");
        assert_eq!(
            TypeRef::array_of(string.clone()).binary_name(),
            "[Ljava.lang.String;"
        );
        assert_eq!(
            TypeRef::array_of(TypeRef::array_of(string)).binary_name(),
            "[[Ljava.lang.String;"
        );
    }

    #[test]
    fn test_substitution_and_erasure() {
        let mut bindings = Substitution::new();
        bindings.insert("T".to_string(), TypeRef::named("com.acme.User"));

        let list_of_t = TypeRef::generic("java.util.List", vec![TypeRef::variable("T")]);
        assert!(list_of_t.has_variables());
        let list_of_user = list_of_t.substitute(&bindings);
        assert!(!list_of_user.has_variables());
        assert_eq!(list_of_user.to_string(), "java.util.List<com.acme.User>");

        // Erasure ignores type arguments
        assert!(list_of_user.erasure_eq(&TypeRef::named("java.util.List")));
        assert!(!TypeRef::variable("T").erasure_eq(&TypeRef::named("T")));
    }

    #[test]
    fn test_retention_names() {
        assert_eq!(RetentionPolicy::from_name("RUNTIME"), Some(RetentionPolicy::Runtime));
        assert_eq!(
            RetentionPolicy::from_name("RetentionPolicy.SOURCE"),
            Some(RetentionPolicy::Source)
        );
        assert_eq!(RetentionPolicy::from_name("class"), Some(RetentionPolicy::Class));
        assert_eq!(RetentionPolicy::from_name("FOREVER"), None);
        assert_eq!(RetentionPolicy::default(), RetentionPolicy::Runtime);
    }

    #[test]
    fn test_repeated_annotations_are_expanded() {
        let mut metadata = AnnotationMetadata::default();
        let instances = ["a", "b", "c"]
            .iter()
            .map(|v| {
                let mut values = Members::new();
                values.insert(
                    "value",
                    MemberValue {
                        value: AnnotationValue::Str(v.to_string()),
                        source: ValueSource::Declared,
                    },
                );
                RepeatedInstance {
                    source: ValueSource::Declared,
                    values,
                }
            })
            .collect();
        metadata.repeated.insert(
            "com.acme.Tag",
            RepeatedAnnotations {
                annotation_type: "com.acme.Tag".to_string(),
                container: "com.acme.Tags".to_string(),
                retention: RetentionPolicy::Runtime,
                instances,
            },
        );

        let tags = metadata.annotations_for_type("com.acme.Tag");
        assert_eq!(tags.len(), 3);
        assert!(tags.iter().all(|t| t.annotation_type == "com.acme.Tag"));
        assert_eq!(tags[1].string_value("value"), Some("b"));

        assert!(metadata.has_annotation("com.acme.Tags"));
        assert!(metadata.is_repeatable_container("com.acme.Tags"));
        let containers = metadata.annotations_for_type("com.acme.Tags");
        assert_eq!(containers.len(), 1);
        assert_eq!(
            containers[0].value("value").and_then(|v| v.as_list()).map(|l| l.len()),
            Some(3)
        );
        assert_eq!(metadata.declared_annotation_names(), vec!["com.acme.Tag"]);
    }

    #[test]
    fn test_expression_serialization() {
        let instance = AnnotationInstance::new("com.acme.Named")
            .with("value", Expr::str("primary"))
            .with("types", Expr::list(vec![Expr::class("com.acme.A")]))
            .with("mode", Expr::qualified("com.acme.Mode", "FAST"));
        let json = serde_json::to_string(&instance).unwrap();
        let parsed: AnnotationInstance = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, instance);
        assert_eq!(
            parsed.members.names().collect::<Vec<_>>(),
            vec!["value", "types", "mode"]
        );
    }

    #[test]
    fn test_declaration_serialization() {
        let mut decl = Declaration::new(
            "com.acme.Service",
            DeclarationKind::Type(TypeInfo {
                super_type: Some(TypeRef::generic(
                    "com.acme.Base",
                    vec![TypeRef::named("java.lang.String")],
                )),
                ..TypeInfo::default()
            }),
        );
        decl.annotations.push(AnnotationInstance::new("com.acme.Singleton"));

        let json = serde_json::to_string(&decl).unwrap();
        let parsed: Declaration = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, decl);
        assert_eq!(parsed.kind_name(), "type");
        assert!(!parsed.is_annotation_type());
    }
}
