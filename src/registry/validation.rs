//! Application validation rules and their structured failure report.

use crate::registry::redirect_uri::{RedirectUriError, RedirectUriValidator};
use crate::registry::types::ApplicationAttributes;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Application attribute a validation failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Uid,
    Secret,
    RedirectUri,
    Scopes,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Uid => "uid",
            Field::Secret => "secret",
            Field::RedirectUri => "redirect_uri",
            Field::Scopes => "scopes",
        };
        f.write_str(name)
    }
}

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    #[error("can't be blank")]
    Blank,

    #[error("has already been taken")]
    Taken,

    #[error("{0}")]
    RedirectUri(RedirectUriError),
}

/// A single `(field, reason)` failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub reason: Reason,
}

/// The full set of failures from one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field, reason: Reason) {
        self.0.push(FieldError { field, reason });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Whether any failure refers to `field`
    pub fn contains(&self, field: Field) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Reasons recorded against `field`
    pub fn on(&self, field: Field) -> Vec<&Reason> {
        self.0
            .iter()
            .filter(|e| e.field == field)
            .map(|e| &e.reason)
            .collect()
    }

    /// `Ok(())` when empty, otherwise the failures themselves
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{} {}", e.field, e.reason))
            .collect();
        f.write_str(&messages.join(", "))
    }
}

/// Decides whether an application must carry at least one scope
pub trait ScopePolicy: Send + Sync {
    fn scope_required(&self, application: &ApplicationAttributes) -> bool;
}

impl<F> ScopePolicy for F
where
    F: Fn(&ApplicationAttributes) -> bool + Send + Sync,
{
    fn scope_required(&self, application: &ApplicationAttributes) -> bool {
        self(application)
    }
}

/// Scope policy driven by the `SCOPE_REQUIRED` setting
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredScopePolicy(bool);

impl ConfiguredScopePolicy {
    pub fn new(required: bool) -> Self {
        Self(required)
    }
}

impl ScopePolicy for ConfiguredScopePolicy {
    fn scope_required(&self, _application: &ApplicationAttributes) -> bool {
        self.0
    }
}

/// Run every rule that needs no storage access.
///
/// Uid uniqueness is checked by the registry against persisted records. The
/// scopes rule only applies when the schema can hold scopes at all.
pub fn validate_attributes(
    attributes: &ApplicationAttributes,
    supports_scopes: bool,
    redirect_uri_validator: &dyn RedirectUriValidator,
    scope_policy: &dyn ScopePolicy,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if is_blank(&attributes.name) {
        errors.add(Field::Name, Reason::Blank);
    }
    if is_blank(&attributes.secret) {
        errors.add(Field::Secret, Reason::Blank);
    }
    if is_blank(&attributes.uid) {
        errors.add(Field::Uid, Reason::Blank);
    }

    if let Err(error) = redirect_uri_validator.validate(&attributes.redirect_uri) {
        errors.add(Field::RedirectUri, Reason::RedirectUri(error));
    }

    if supports_scopes && attributes.scopes.is_empty() && scope_policy.scope_required(attributes)
    {
        errors.add(Field::Scopes, Reason::Blank);
    }

    errors
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::redirect_uri::UriRedirectValidator;
    use crate::registry::scopes::Scopes;

    fn attributes() -> ApplicationAttributes {
        ApplicationAttributes {
            name: "Test".to_string(),
            uid: "uid".to_string(),
            secret: "secret".to_string(),
            redirect_uri: "https://example.com/cb".to_string(),
            scopes: Scopes::new(),
        }
    }

    #[test]
    fn test_valid_attributes() {
        let errors = validate_attributes(
            &attributes(),
            true,
            &UriRedirectValidator::default(),
            &ConfiguredScopePolicy::new(false),
        );
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_collects_every_failure() {
        let mut attrs = attributes();
        attrs.name = " ".to_string();
        attrs.uid = String::new();
        attrs.secret = String::new();
        attrs.redirect_uri = "https://example.com/cb#x".to_string();

        let errors = validate_attributes(
            &attrs,
            true,
            &UriRedirectValidator::default(),
            &ConfiguredScopePolicy::new(true),
        );

        assert_eq!(errors.len(), 5);
        assert_eq!(errors.on(Field::Name), vec![&Reason::Blank]);
        assert_eq!(errors.on(Field::Uid), vec![&Reason::Blank]);
        assert_eq!(errors.on(Field::Secret), vec![&Reason::Blank]);
        assert_eq!(errors.on(Field::Scopes), vec![&Reason::Blank]);
        assert_eq!(
            errors.on(Field::RedirectUri),
            vec![&Reason::RedirectUri(RedirectUriError::FragmentPresent)]
        );
        assert_eq!(
            errors.to_string(),
            "name can't be blank, secret can't be blank, uid can't be blank, \
             redirect_uri cannot contain a fragment, scopes can't be blank"
        );
    }

    #[test]
    fn test_scope_rule_follows_policy() {
        let validator = UriRedirectValidator::default();

        let required = validate_attributes(&attributes(), true, &validator, &ConfiguredScopePolicy::new(true));
        assert!(required.contains(Field::Scopes));

        let optional = validate_attributes(&attributes(), true, &validator, &ConfiguredScopePolicy::new(false));
        assert!(!optional.contains(Field::Scopes));

        // Without a scopes column the rule cannot apply
        let no_column = validate_attributes(&attributes(), false, &validator, &ConfiguredScopePolicy::new(true));
        assert!(!no_column.contains(Field::Scopes));

        let mut scoped = attributes();
        scoped.scopes = Scopes::from_string("read");
        let satisfied = validate_attributes(&scoped, true, &validator, &ConfiguredScopePolicy::new(true));
        assert!(satisfied.is_empty());
    }

    #[test]
    fn test_policy_closure_sees_candidate() {
        let validator = UriRedirectValidator::default();
        let policy = |app: &ApplicationAttributes| app.name.starts_with("Scoped");

        let mut attrs = attributes();
        assert!(validate_attributes(&attrs, true, &validator, &policy).is_empty());

        attrs.name = "Scoped App".to_string();
        assert!(validate_attributes(&attrs, true, &validator, &policy).contains(Field::Scopes));
    }

    #[test]
    fn test_serialized_shape() {
        let mut errors = ValidationErrors::new();
        errors.add(Field::Uid, Reason::Taken);
        errors.add(
            Field::RedirectUri,
            Reason::RedirectUri(RedirectUriError::SecuredUri),
        );

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"field": "uid", "reason": "taken"},
                {"field": "redirect_uri", "reason": {"redirect_uri": "secured_uri"}}
            ])
        );
    }
}
