//! Annotation value validation hook.

use annolith_types::{AnnotationValue, Declaration};

/// Checks converted annotation values before they are recorded.
///
/// Returned messages are reported as errors against the annotated
/// declaration. The value is recorded regardless, so a failing validator never
/// changes the assembled metadata.
pub trait AnnotationValidator {
    /// Validate one member value.
    ///
    /// * `declaration` - the declaration the annotation was found on
    /// * `annotation_type` - fully qualified annotation type name
    /// * `member` - the annotation type's member method, when it resolves
    /// * `member_name` - the member name as written
    fn validate(
        &self,
        declaration: &Declaration,
        annotation_type: &str,
        member: Option<&Declaration>,
        member_name: &str,
        value: &AnnotationValue,
    ) -> Vec<String>;
}

impl<F> AnnotationValidator for F
where
    F: Fn(&Declaration, &str, Option<&Declaration>, &str, &AnnotationValue) -> Vec<String>,
{
    fn validate(
        &self,
        declaration: &Declaration,
        annotation_type: &str,
        member: Option<&Declaration>,
        member_name: &str,
        value: &AnnotationValue,
    ) -> Vec<String> {
        self(declaration, annotation_type, member, member_name, value)
    }
}

/// Rejects empty strings and empty lists for selected annotation members.
///
/// Members are given as `annotation_type#member`.
#[derive(Debug, Clone, Default)]
pub struct NonEmptyValidator {
    members: Vec<String>,
}

impl NonEmptyValidator {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    fn applies_to(&self, annotation_type: &str, member_name: &str) -> bool {
        self.members.iter().any(|m| {
            m.split_once('#')
                .is_some_and(|(ty, name)| ty == annotation_type && name == member_name)
        })
    }
}

impl AnnotationValidator for NonEmptyValidator {
    fn validate(
        &self,
        declaration: &Declaration,
        annotation_type: &str,
        _member: Option<&Declaration>,
        member_name: &str,
        value: &AnnotationValue,
    ) -> Vec<String> {
        if !self.applies_to(annotation_type, member_name) {
            return Vec::new();
        }
        let empty = match value {
            AnnotationValue::Str(s) => s.trim().is_empty(),
            AnnotationValue::List(list) => list.is_empty(),
            _ => false,
        };
        if empty {
            vec![format!(
                "@{}({}) on {} must not be empty",
                annotation_type, member_name, declaration.name
            )]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annolith_types::{DeclarationKind, ValueList};

    fn decl() -> Declaration {
        Declaration::new("com.acme.Service", DeclarationKind::Package)
    }

    #[test]
    fn test_closure_validator() {
        let validator = |_: &Declaration,
                         _: &str,
                         _: Option<&Declaration>,
                         member_name: &str,
                         value: &AnnotationValue| {
            match value.as_i64() {
                Some(n) if n < 0 => vec![format!("{} must be positive", member_name)],
                _ => Vec::new(),
            }
        };

        let errors = validator.validate(
            &decl(),
            "com.acme.Pool",
            None,
            "size",
            &AnnotationValue::Int(-1),
        );
        assert_eq!(errors, vec!["size must be positive".to_string()]);
        assert!(
            validator
                .validate(&decl(), "com.acme.Pool", None, "size", &AnnotationValue::Int(4))
                .is_empty()
        );
    }

    #[test]
    fn test_non_empty_validator() {
        let validator = NonEmptyValidator::new(["com.acme.Named#value"]);

        let errors = validator.validate(
            &decl(),
            "com.acme.Named",
            None,
            "value",
            &AnnotationValue::Str("  ".to_string()),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("com.acme.Named"));

        assert!(
            !validator
                .validate(
                    &decl(),
                    "com.acme.Named",
                    None,
                    "value",
                    &AnnotationValue::List(ValueList::empty()),
                )
                .is_empty()
        );
        // Other members are not checked
        assert!(
            validator
                .validate(
                    &decl(),
                    "com.acme.Named",
                    None,
                    "alias",
                    &AnnotationValue::Str(String::new()),
                )
                .is_empty()
        );
    }
}
