//! Conversion of raw annotation expressions into canonical values.
//!
//! Conversion never fails hard. An expression that cannot be resolved yields
//! `None`, the member is omitted, and the default value lookup may fill it
//! in later.

use annolith_types::{
    AnnotationInstance, AnnotationValue, ClassRef, ComponentType, DeclId, Expr, HostValue,
    Literal, Members, NestedAnnotation, TypeKind, TypeRef, ValueList,
};
use log::debug;

use crate::config::BuilderConfig;
use crate::diagnostics::DiagnosticSink;
use crate::model::DeclarationModel;
use crate::validation::AnnotationValidator;

/// Reads annotation member values against a declaration model.
pub struct ValueReader<'a, M: ?Sized> {
    model: &'a M,
    config: &'a BuilderConfig,
    validator: Option<&'a dyn AnnotationValidator>,
}

impl<'a, M: DeclarationModel + ?Sized> ValueReader<'a, M> {
    pub fn new(model: &'a M, config: &'a BuilderConfig) -> Self {
        Self {
            model,
            config,
            validator: None,
        }
    }

    /// Run `validator` on every value recorded by [`Self::read_raw_values`].
    pub fn with_validator(mut self, validator: &'a dyn AnnotationValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn model(&self) -> &'a M {
        self.model
    }

    pub fn config(&self) -> &'a BuilderConfig {
        self.config
    }

    /// Convert a member expression.
    ///
    /// * `originating` - the declaration the annotation was found on
    /// * `member` - the annotation member method, when it resolves; its
    ///   return type decides whether a single nested annotation is wrapped in
    ///   a list
    pub fn read_value(
        &self,
        originating: DeclId,
        member: Option<DeclId>,
        member_name: &str,
        expr: &Expr,
    ) -> Option<AnnotationValue> {
        let value = self.convert(expr, member, 0, false);
        if value.is_none() {
            debug!(
                "No value for member '{}' on {}",
                member_name,
                self.model.qualified_name(originating)
            );
        }
        value
    }

    /// Convert a member expression into `output` unless the member is
    /// already present there.
    ///
    /// The first value written for a member wins. Validation errors are
    /// reported to `sink` against `originating` and the value is still
    /// recorded. Returns `true` when a value was inserted.
    #[allow(clippy::too_many_arguments)]
    pub fn read_raw_values(
        &self,
        originating: DeclId,
        annotation_type: &str,
        member: Option<DeclId>,
        member_name: &str,
        expr: &Expr,
        output: &mut Members<AnnotationValue>,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        if output.contains(member_name) {
            return false;
        }
        let Some(value) = self.read_value(originating, member, member_name, expr) else {
            return false;
        };

        if let (Some(validator), Some(declaration)) =
            (self.validator, self.model.declaration(originating))
        {
            let member_decl = member.and_then(|m| self.model.declaration(m));
            for message in
                validator.validate(declaration, annotation_type, member_decl, member_name, &value)
            {
                sink.add_error(originating, message);
            }
        }

        output.insert(member_name, value);
        true
    }

    /// Convert a value the host already resolved.
    pub fn read_host_value(&self, value: &HostValue, member: Option<DeclId>) -> Option<AnnotationValue> {
        self.convert_host(value, member, 0, false)
    }

    /// Convert a nested annotation, member by member.
    pub fn read_annotation(&self, instance: &AnnotationInstance) -> NestedAnnotation {
        self.nested_annotation(instance, 0)
    }

    fn convert(
        &self,
        expr: &Expr,
        member: Option<DeclId>,
        depth: usize,
        in_list: bool,
    ) -> Option<AnnotationValue> {
        if depth >= self.config.max_value_depth {
            debug!("Value nested deeper than {}, dropping", self.config.max_value_depth);
            return None;
        }

        match expr {
            Expr::Literal(literal) => literal_value(literal),
            Expr::Annotation(instance) => {
                let nested = self.nested_annotation(instance, depth + 1);
                Some(self.wrap_nested(nested, member, in_list))
            }
            Expr::Qualified { owner, member: constant } => {
                self.qualified_value(owner, constant, depth)
            }
            Expr::TypeLiteral(ty) => Some(AnnotationValue::Class(ClassRef::from(ty))),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .filter_map(|item| self.convert(item, member, depth + 1, true))
                    .collect();
                Some(AnnotationValue::List(self.list_for_member(values, member)))
            }
            Expr::Variable { name, initializer } => match initializer {
                Some(initializer) => self.convert(initializer, member, depth + 1, in_list),
                None => {
                    debug!("Variable '{}' has no known initializer", name);
                    None
                }
            },
            Expr::Value(value) => self.convert_host(value, member, depth, in_list),
            Expr::Unsupported(source) => {
                debug!("Unsupported value expression: {}", source);
                None
            }
        }
    }

    fn convert_host(
        &self,
        value: &HostValue,
        member: Option<DeclId>,
        depth: usize,
        in_list: bool,
    ) -> Option<AnnotationValue> {
        if depth >= self.config.max_value_depth {
            debug!("Value nested deeper than {}, dropping", self.config.max_value_depth);
            return None;
        }

        let converted = match value {
            HostValue::Str(s) => AnnotationValue::Str(s.clone()),
            HostValue::Int(i) => AnnotationValue::Int(*i),
            HostValue::Float(f) => AnnotationValue::Float(*f),
            HostValue::Bool(b) => AnnotationValue::Bool(*b),
            HostValue::Char(c) => AnnotationValue::Char(*c),
            HostValue::Class(ty) => AnnotationValue::Class(ClassRef::from(ty)),
            HostValue::Enum {
                type_name,
                constant,
            } => AnnotationValue::Enum {
                type_name: type_name.clone(),
                constant: constant.clone(),
            },
            HostValue::Annotation(instance) => {
                let nested = self.nested_annotation(instance, depth + 1);
                self.wrap_nested(nested, member, in_list)
            }
            HostValue::Array(items) => {
                let values = items
                    .iter()
                    .filter_map(|item| self.convert_host(item, member, depth + 1, true))
                    .collect();
                AnnotationValue::List(self.list_for_member(values, member))
            }
        };
        Some(converted)
    }

    /// `Type.CONSTANT`: enum constants become their name, other constants
    /// are read from the static field when the owner resolves.
    fn qualified_value(&self, owner: &str, constant: &str, depth: usize) -> Option<AnnotationValue> {
        let Some(ty) = self.model.resolve_type(owner) else {
            debug!("Cannot resolve {} for {}.{}", owner, owner, constant);
            return None;
        };
        let info = self.model.type_info(ty)?;
        if info.type_kind == TypeKind::Enum {
            return Some(AnnotationValue::Str(constant.to_string()));
        }

        let Some(field) = self.model.static_field(ty, constant) else {
            debug!("No static field {}.{}", owner, constant);
            return None;
        };
        let field_info = self.model.declaration(field)?.field_info()?;
        if let Some(value) = &field_info.constant_value {
            return self.convert_host(value, None, depth + 1, false);
        }
        match &field_info.initializer {
            Some(initializer) => self.convert(initializer, None, depth + 1, false),
            None => {
                debug!("Static field {}.{} has no constant value", owner, constant);
                None
            }
        }
    }

    fn nested_annotation(&self, instance: &AnnotationInstance, depth: usize) -> NestedAnnotation {
        let mut nested = NestedAnnotation::new(instance.annotation_type.as_str());
        for (name, expr) in instance.members.iter() {
            let member = self.model.annotation_member(&instance.annotation_type, name);
            if let Some(value) = self.convert(expr, member, depth, false) {
                nested.values.insert(name, value);
            }
        }
        nested
    }

    /// A single nested annotation assigned to an array member becomes a
    /// one-element list.
    fn wrap_nested(
        &self,
        nested: NestedAnnotation,
        member: Option<DeclId>,
        in_list: bool,
    ) -> AnnotationValue {
        let value = AnnotationValue::Annotation(nested);
        if !in_list && self.returns_array(member) {
            AnnotationValue::List(ValueList {
                component: ComponentType::Annotation,
                items: vec![value],
            })
        } else {
            value
        }
    }

    fn returns_array(&self, member: Option<DeclId>) -> bool {
        member
            .and_then(|m| self.model.method_info(m))
            .is_some_and(|info| info.return_type.is_array())
    }

    /// Infer a list, falling back to the member's declared component type
    /// when nothing was converted. Integer lists of a floating point member
    /// are widened.
    fn list_for_member(&self, values: Vec<AnnotationValue>, member: Option<DeclId>) -> ValueList {
        let mut list = infer_list(values);
        let Some(TypeRef::Array { component }) = member
            .and_then(|m| self.model.method_info(m))
            .map(|info| &info.return_type)
        else {
            return list;
        };
        let declared = self.component_for_type(component);
        match (list.component, declared) {
            (ComponentType::Unknown, _) => list.component = declared,
            (ComponentType::Int, ComponentType::Float) => {
                list = ValueList {
                    component: ComponentType::Float,
                    items: list
                        .items
                        .into_iter()
                        .filter_map(|item| coerce(item, ComponentType::Float))
                        .collect(),
                };
            }
            _ => {}
        }
        list
    }

    fn component_for_type(&self, ty: &TypeRef) -> ComponentType {
        let Some(name) = ty.raw_name() else {
            return ComponentType::Unknown;
        };
        match name {
            "java.lang.String" | "String" | "kotlin.String" => ComponentType::String,
            "int" | "long" | "short" | "byte" | "java.lang.Integer" | "java.lang.Long"
            | "java.lang.Short" | "java.lang.Byte" => ComponentType::Int,
            "float" | "double" | "java.lang.Float" | "java.lang.Double" => ComponentType::Float,
            "boolean" | "java.lang.Boolean" => ComponentType::Bool,
            "char" | "java.lang.Character" => ComponentType::Char,
            "java.lang.Class" | "kotlin.reflect.KClass" => ComponentType::Class,
            _ => match self
                .model
                .resolve_type(name)
                .and_then(|id| self.model.type_info(id))
                .map(|info| info.type_kind)
            {
                Some(TypeKind::Enum) => ComponentType::Enum,
                Some(TypeKind::Annotation) => ComponentType::Annotation,
                _ => ComponentType::Unknown,
            },
        }
    }
}

fn literal_value(literal: &Literal) -> Option<AnnotationValue> {
    match literal {
        Literal::Str(s) => Some(AnnotationValue::Str(s.clone())),
        Literal::Int(i) => Some(AnnotationValue::Int(*i)),
        Literal::Float(f) => Some(AnnotationValue::Float(*f)),
        Literal::Bool(b) => Some(AnnotationValue::Bool(*b)),
        Literal::Char(c) => Some(AnnotationValue::Char(*c)),
        Literal::Null => None,
    }
}

/// Build a homogeneous list from converted elements.
///
/// The component type is that of the first element, unless a later element
/// is a nested annotation or a class reference, which forces the component
/// to that kind. Mixed integer and floating point elements widen to a
/// floating point list. Nested lists are flattened. Elements that cannot be
/// coerced to the final component are dropped.
pub fn infer_list(values: Vec<AnnotationValue>) -> ValueList {
    let flattened: Vec<AnnotationValue> = values
        .into_iter()
        .flat_map(|value| match value {
            AnnotationValue::List(list) => list.items,
            other => vec![other],
        })
        .collect();

    let mut component = ComponentType::Unknown;
    for value in &flattened {
        let kind = value.component_type();
        if component == ComponentType::Unknown
            || matches!(kind, ComponentType::Annotation | ComponentType::Class)
        {
            component = kind;
        } else if component == ComponentType::Int && kind == ComponentType::Float {
            component = ComponentType::Float;
        }
    }

    let items = flattened
        .into_iter()
        .filter_map(|value| {
            let coerced = coerce(value, component);
            if coerced.is_none() {
                debug!("Dropping list element incompatible with {:?}", component);
            }
            coerced
        })
        .collect();
    ValueList { component, items }
}

fn coerce(value: AnnotationValue, component: ComponentType) -> Option<AnnotationValue> {
    if value.component_type() == component {
        return Some(value);
    }
    match (component, value) {
        (ComponentType::Class, AnnotationValue::Str(name)) => {
            Some(AnnotationValue::Class(ClassRef::new(name)))
        }
        (ComponentType::String, AnnotationValue::Enum { constant, .. }) => {
            Some(AnnotationValue::Str(constant))
        }
        (ComponentType::String, AnnotationValue::Class(class)) => {
            Some(AnnotationValue::Str(class.name))
        }
        (ComponentType::String, AnnotationValue::Int(i)) => Some(AnnotationValue::Str(i.to_string())),
        (ComponentType::String, AnnotationValue::Float(f)) => {
            Some(AnnotationValue::Str(f.to_string()))
        }
        (ComponentType::String, AnnotationValue::Bool(b)) => Some(AnnotationValue::Str(b.to_string())),
        (ComponentType::String, AnnotationValue::Char(c)) => Some(AnnotationValue::Str(c.to_string())),
        (ComponentType::Float, AnnotationValue::Int(i)) => Some(AnnotationValue::Float(i as f64)),
        _ => None,
    }
}
