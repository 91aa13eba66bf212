//! External identity resolution.
//!
//! An identity is `<entityTag>|<key1>|<key2>|...` with the natural keys in
//! their declared order. The function is pure: the same natural keys always
//! produce the same bytes, which is what makes replaying a pass idempotent.

use crate::error::ValidationError;
use crate::record::ChangeRecord;
use crate::values::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between the entity tag and each natural-key component.
pub const IDENTITY_SEPARATOR: char = '|';

/// Escape character for separators and escapes embedded in key values.
pub const IDENTITY_ESCAPE: char = '\\';

/// Version of the identity composition scheme.
///
/// Bumping it means every destination row keyed with the old scheme must be
/// rewritten, so the composition below must not change without bumping it.
pub const IDENTITY_SCHEME_VERSION: u32 = 1;

/// Errors raised when configuring an identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityConfigError {
    #[error("entity tag must not be empty")]
    EmptyTag,

    #[error("entity tag '{0}' must not contain '|' or '\\'")]
    InvalidTagCharacter(String),

    #[error("at least one natural key field is required")]
    NoNaturalKeys,

    #[error("natural key field '{0}' is declared more than once")]
    DuplicateNaturalKey(String),
}

/// Tag identifying the synchronized entity kind (e.g. `"service_activity"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityTag(String);

impl EntityTag {
    /// Create a new entity tag.
    pub fn new(tag: impl Into<String>) -> Result<Self, IdentityConfigError> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(IdentityConfigError::EmptyTag);
        }
        if tag.contains(IDENTITY_SEPARATOR) || tag.contains(IDENTITY_ESCAPE) {
            return Err(IdentityConfigError::InvalidTagCharacter(tag));
        }
        Ok(Self(tag))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityTag {
    type Error = IdentityConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityTag> for String {
    fn from(tag: EntityTag) -> Self {
        tag.0
    }
}

/// Opaque, deterministic identity correlating a source record with its
/// destination row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalIdentity(String);

impl ExternalIdentity {
    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an identity string previously produced by [`IdentityResolver`].
    ///
    /// Used by destination adapters reading identities back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for ExternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives [`ExternalIdentity`] values from natural keys.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tag: EntityTag,
    natural_keys: Vec<String>,
}

impl IdentityResolver {
    /// Create a resolver for `tag` over `natural_keys` in declared order.
    pub fn new(tag: EntityTag, natural_keys: Vec<String>) -> Result<Self, IdentityConfigError> {
        if natural_keys.is_empty() {
            return Err(IdentityConfigError::NoNaturalKeys);
        }
        for (i, key) in natural_keys.iter().enumerate() {
            if natural_keys[..i].contains(key) {
                return Err(IdentityConfigError::DuplicateNaturalKey(key.clone()));
            }
        }
        Ok(Self { tag, natural_keys })
    }

    pub fn tag(&self) -> &EntityTag {
        &self.tag
    }

    pub fn natural_keys(&self) -> &[String] {
        &self.natural_keys
    }

    /// Resolve the identity of `record`.
    ///
    /// Every natural-key field must be present and non-empty after trimming;
    /// the first offending field is named in the error.
    pub fn resolve(&self, record: &ChangeRecord) -> Result<ExternalIdentity, ValidationError> {
        let mut identity = String::from(self.tag.as_str());
        for field in &self.natural_keys {
            let component = render_key(field, record.get(field))?;
            identity.push(IDENTITY_SEPARATOR);
            push_escaped(&mut identity, &component);
        }
        Ok(ExternalIdentity(identity))
    }
}

fn render_key(field: &str, value: Option<&FieldValue>) -> Result<String, ValidationError> {
    let rendered = value
        .and_then(FieldValue::key_text)
        .ok_or_else(|| ValidationError::MissingKeyField {
            field: field.to_string(),
        })?;
    if rendered.is_empty() {
        return Err(ValidationError::EmptyKeyField {
            field: field.to_string(),
        });
    }
    Ok(rendered)
}

fn push_escaped(out: &mut String, component: &str) {
    for c in component.chars() {
        if c == IDENTITY_SEPARATOR || c == IDENTITY_ESCAPE {
            out.push(IDENTITY_ESCAPE);
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn resolver(keys: &[&str]) -> IdentityResolver {
        IdentityResolver::new(
            EntityTag::new("activity").unwrap(),
            keys.iter().map(|k| k.to_string()).collect(),
        )
        .unwrap()
    }

    fn activity(ticket: &str, task: i64) -> ChangeRecord {
        ChangeRecord::new()
            .with("ticket", ticket)
            .with("task", task)
            .with(
                "activity_at",
                Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap(),
            )
    }

    #[test]
    fn test_resolve_composes_tag_and_keys_in_order() {
        let id = resolver(&["ticket", "task", "activity_at"])
            .resolve(&activity("T-100", 3))
            .unwrap();
        assert_eq!(id.as_str(), "activity|T-100|3|2025-03-04T08:30:00.000000Z");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let r = resolver(&["ticket", "task"]);
        let a = r.resolve(&activity("T-100", 3)).unwrap();
        let b = r.resolve(&activity("T-100", 3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_changing_one_key_changes_identity() {
        let r = resolver(&["ticket", "task", "activity_at"]);
        let base = r.resolve(&activity("T-100", 3)).unwrap();
        assert_ne!(base, r.resolve(&activity("T-101", 3)).unwrap());
        assert_ne!(base, r.resolve(&activity("T-100", 4)).unwrap());

        let later = activity("T-100", 3).with(
            "activity_at",
            Utc.with_ymd_and_hms(2025, 3, 4, 8, 31, 0).unwrap(),
        );
        assert_ne!(base, r.resolve(&later).unwrap());
    }

    #[test]
    fn test_text_keys_are_trimmed() {
        let r = resolver(&["ticket", "task"]);
        assert_eq!(
            r.resolve(&activity("  T-100 ", 3)).unwrap(),
            r.resolve(&activity("T-100", 3)).unwrap()
        );
    }

    #[test]
    fn test_missing_and_empty_keys_name_the_field() {
        let r = resolver(&["ticket", "task"]);

        let missing = ChangeRecord::new().with("ticket", "T-1");
        assert_eq!(
            r.resolve(&missing),
            Err(ValidationError::MissingKeyField {
                field: "task".to_string()
            })
        );

        let null = ChangeRecord::new()
            .with("ticket", FieldValue::Null)
            .with("task", 1i64);
        assert_eq!(
            r.resolve(&null),
            Err(ValidationError::MissingKeyField {
                field: "ticket".to_string()
            })
        );

        let blank = activity("   ", 1);
        assert_eq!(
            r.resolve(&blank),
            Err(ValidationError::EmptyKeyField {
                field: "ticket".to_string()
            })
        );
    }

    #[test]
    fn test_embedded_separator_does_not_collide() {
        let r = resolver(&["a", "b"]);
        let left = ChangeRecord::new().with("a", "x|y").with("b", "z");
        let right = ChangeRecord::new().with("a", "x").with("b", "y|z");
        let l = r.resolve(&left).unwrap();
        let rr = r.resolve(&right).unwrap();
        assert_ne!(l, rr);
        assert_eq!(l.as_str(), "activity|x\\|y|z");
    }

    #[test]
    fn test_decimal_keys_are_normalized() {
        let r = resolver(&["amount"]);
        let a = ChangeRecord::new().with("amount", Decimal::from_str("1.50").unwrap());
        let b = ChangeRecord::new().with("amount", Decimal::from_str("1.5").unwrap());
        assert_eq!(r.resolve(&a).unwrap(), r.resolve(&b).unwrap());
    }

    #[test]
    fn test_different_tags_never_collide() {
        let a = IdentityResolver::new(EntityTag::new("ticket").unwrap(), vec!["id".into()])
            .unwrap();
        let b = IdentityResolver::new(EntityTag::new("task").unwrap(), vec!["id".into()]).unwrap();
        let record = ChangeRecord::new().with("id", "42");
        assert_ne!(a.resolve(&record).unwrap(), b.resolve(&record).unwrap());
    }

    #[test]
    fn test_resolver_config_validation() {
        assert_eq!(EntityTag::new(" "), Err(IdentityConfigError::EmptyTag));
        assert!(matches!(
            EntityTag::new("a|b"),
            Err(IdentityConfigError::InvalidTagCharacter(_))
        ));
        let tag = EntityTag::new("t").unwrap();
        assert_eq!(
            IdentityResolver::new(tag.clone(), vec![]).unwrap_err(),
            IdentityConfigError::NoNaturalKeys
        );
        assert_eq!(
            IdentityResolver::new(tag, vec!["a".into(), "a".into()]).unwrap_err(),
            IdentityConfigError::DuplicateNaturalKey("a".into())
        );
    }
}
