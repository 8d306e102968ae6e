//! Deterministic cache key construction.
//!
//! Keys have the shape `<ns>:<prefix>:<field>:<value>:<field>:<value>...`.
//! Fields are rendered as `field:normalized-value`, sorted, and then any
//! identity field (a field whose name ends in `id`) is moved to the front so
//! keys for the same resource cluster together under pattern scans.

use serde_json::Value;

use super::args::{apply_mapper, ArgsMapper, ArgsRecord};
use super::error::KeyError;

/// Separator between every key segment.
pub const KEY_SEPARATOR: &str = ":";

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "cache";

const ROOT_KEY: &str = "rootKey";
const ID_KEY: &str = "idKey";
const IDENTITY_MARKER: &str = "id:";

/// Builds namespaced cache keys from argument records.
///
/// # Examples
///
/// ```
/// use recall_core::cache::{to_record, KeyBuilder};
/// use serde_json::json;
///
/// let keys = KeyBuilder::new("ns");
/// let args = to_record(&json!({"id": 7, "name": "Ann "})).unwrap();
///
/// assert_eq!(keys.build_key("user", &args, None), "ns:user:id:7:name:ann-");
/// assert_eq!(keys.build_id_key("user", &["id"], &args, None).unwrap(), "ns:user:idKey:id:7");
/// assert_eq!(keys.build_root_key("user"), "ns:user:rootKey");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the key standing for "no arguments" under `prefix`.
    pub fn build_root_key(&self, prefix: &str) -> String {
        [self.namespace.as_str(), prefix, ROOT_KEY].join(KEY_SEPARATOR)
    }

    /// Returns a namespaced glob pattern. An empty pattern matches everything.
    ///
    /// ```
    /// use recall_core::cache::KeyBuilder;
    ///
    /// let keys = KeyBuilder::new("ns");
    /// assert_eq!(keys.build_pattern("user:*"), "ns:user:*");
    /// assert_eq!(keys.build_pattern(""), "ns:*");
    /// ```
    pub fn build_pattern(&self, custom_pattern: &str) -> String {
        let pattern = if custom_pattern.is_empty() {
            "*"
        } else {
            custom_pattern
        };
        [self.namespace.as_str(), pattern].join(KEY_SEPARATOR)
    }

    /// Builds the composite key for `record` (after `mapper`, if given).
    ///
    /// Null fields do not contribute. A record without contributing fields
    /// yields [`build_root_key`](Self::build_root_key).
    pub fn build_key(
        &self,
        prefix: &str,
        record: &ArgsRecord,
        mapper: Option<&dyn ArgsMapper>,
    ) -> String {
        let record = apply_mapper(record, mapper);

        let mut fields: Vec<(bool, String)> = record
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, value)| {
                let rendered = format!(
                    "{field}{KEY_SEPARATOR}{}",
                    normalize_value(&render_value(value))
                );
                (is_identity_field(field), rendered)
            })
            .collect();

        if fields.is_empty() {
            return self.build_root_key(prefix);
        }

        fields.sort_by(|a, b| a.1.cmp(&b.1));
        let (identity, rest): (Vec<_>, Vec<_>) =
            fields.into_iter().partition(|(identity, _)| *identity);

        let generated = identity
            .into_iter()
            .chain(rest)
            .map(|(_, rendered)| rendered)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);

        [self.namespace.as_str(), prefix, generated.as_str()].join(KEY_SEPARATOR)
    }

    /// Builds the identity key: the key of `record` restricted to `id_columns`,
    /// under the derived prefix `<prefix>:idKey`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingIdColumns`] if any column is absent or null
    /// in the (mapped) record. A column listed twice is reported as missing,
    /// since the record can only supply it once.
    pub fn build_id_key(
        &self,
        prefix: &str,
        id_columns: &[&str],
        record: &ArgsRecord,
        mapper: Option<&dyn ArgsMapper>,
    ) -> Result<String, KeyError> {
        let record = apply_mapper(record, mapper);

        let mut id_record = ArgsRecord::new();
        let mut missing = Vec::new();
        for column in id_columns {
            match record.get(*column) {
                Some(value) if !value.is_null() && !id_record.contains_key(*column) => {
                    id_record.insert((*column).to_string(), value.clone());
                }
                _ => missing.push((*column).to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(KeyError::MissingIdColumns { missing });
        }

        let id_prefix = format!("{prefix}{KEY_SEPARATOR}{ID_KEY}");
        Ok(self.build_key(&id_prefix, &id_record, None))
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// Lower-cases `value` and collapses every whitespace run into a single `-`.
///
/// ```
/// use recall_core::cache::normalize_value;
///
/// assert_eq!(normalize_value("Ann "), "ann-");
/// assert_eq!(normalize_value("New \t York"), "new-york");
/// ```
pub fn normalize_value(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    let mut in_whitespace = false;

    for c in value.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                normalized.push('-');
            }
            in_whitespace = true;
        } else {
            normalized.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }

    normalized
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_identity_field(field: &str) -> bool {
    format!("{field}{KEY_SEPARATOR}").contains(IDENTITY_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::to_record;
    use serde_json::json;

    fn keys() -> KeyBuilder {
        KeyBuilder::new("ns")
    }

    fn record(value: Value) -> ArgsRecord {
        to_record(&value).unwrap()
    }

    #[test]
    fn test_build_root_key() {
        assert_eq!(keys().build_root_key("user"), "ns:user:rootKey");
    }

    #[test]
    fn test_default_namespace() {
        assert_eq!(KeyBuilder::default().build_root_key("user"), "cache:user:rootKey");
    }

    #[test]
    fn test_build_pattern() {
        assert_eq!(keys().build_pattern("user:idKey:*"), "ns:user:idKey:*");
        assert_eq!(keys().build_pattern(""), "ns:*");
    }

    #[test]
    fn test_build_key_scenario() {
        let args = record(json!({"id": 7, "name": "Ann "}));
        assert_eq!(keys().build_key("user", &args, None), "ns:user:id:7:name:ann-");
    }

    #[test]
    fn test_build_key_is_deterministic() {
        let args = record(json!({"zeta": "Z", "alpha": 1, "user_id": 9, "tags": ["a", "b"]}));
        let first = keys().build_key("search", &args, None);
        for _ in 0..10 {
            assert_eq!(keys().build_key("search", &args, None), first);
        }
    }

    #[test]
    fn test_build_key_empty_record_is_root_key() {
        let args = ArgsRecord::new();
        assert_eq!(keys().build_key("user", &args, None), keys().build_root_key("user"));
    }

    #[test]
    fn test_build_key_all_null_fields_is_root_key() {
        let args = record(json!({"name": null, "page": null}));
        assert_eq!(keys().build_key("user", &args, None), "ns:user:rootKey");
    }

    #[test]
    fn test_build_key_drops_null_fields() {
        let args = record(json!({"id": 1, "name": null}));
        assert_eq!(keys().build_key("user", &args, None), "ns:user:id:1");
    }

    #[test]
    fn test_identity_fields_come_first_in_relative_order() {
        let args = record(json!({
            "name": "x",
            "user_id": 2,
            "age": 3,
            "account_id": 1,
        }));
        assert_eq!(
            keys().build_key("p", &args, None),
            "ns:p:account_id:1:user_id:2:age:3:name:x"
        );
    }

    #[test]
    fn test_non_identity_fields_are_sorted() {
        let args = record(json!({"c": "3", "a": "1", "b": "2"}));
        assert_eq!(keys().build_key("p", &args, None), "ns:p:a:1:b:2:c:3");
    }

    #[test]
    fn test_field_named_like_id_but_not_suffix_is_not_identity() {
        let args = record(json!({"identity": "x", "a": 1}));
        assert_eq!(keys().build_key("p", &args, None), "ns:p:a:1:identity:x");
    }

    #[test]
    fn test_values_are_normalized() {
        let args = record(json!({"city": "New   York", "flag": true}));
        assert_eq!(keys().build_key("p", &args, None), "ns:p:city:new-york:flag:true");
    }

    #[test]
    fn test_build_key_with_mapper() {
        let only_id = |record: &ArgsRecord| {
            record
                .iter()
                .filter(|(field, _)| field.as_str() == "id")
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect::<ArgsRecord>()
        };
        let args = record(json!({"id": 3, "page": 2}));
        assert_eq!(keys().build_key("user", &args, Some(&only_id)), "ns:user:id:3");
    }

    #[test]
    fn test_mapper_to_empty_record_is_root_key() {
        let drop_all = |_: &ArgsRecord| ArgsRecord::new();
        let args = record(json!({"id": 3}));
        assert_eq!(keys().build_key("user", &args, Some(&drop_all)), "ns:user:rootKey");
    }

    #[test]
    fn test_build_id_key() {
        let args = record(json!({"id": 7, "name": "Ann "}));
        assert_eq!(
            keys().build_id_key("user", &["id"], &args, None).unwrap(),
            "ns:user:idKey:id:7"
        );
    }

    #[test]
    fn test_build_id_key_multiple_columns() {
        let args = record(json!({"tenant": "Acme", "id": 7, "name": "Ann"}));
        assert_eq!(
            keys().build_id_key("user", &["tenant", "id"], &args, None).unwrap(),
            "ns:user:idKey:id:7:tenant:acme"
        );
    }

    #[test]
    fn test_build_id_key_rejects_repeated_column() {
        let args = record(json!({"id": 7, "name": "Ann"}));
        let err = keys().build_id_key("user", &["id", "id"], &args, None).unwrap_err();
        assert_eq!(
            err,
            KeyError::MissingIdColumns {
                missing: vec!["id".to_string()]
            }
        );
    }

    #[test]
    fn test_build_id_key_missing_column() {
        let args = record(json!({"name": "Ann"}));
        let err = keys().build_id_key("user", &["id", "name"], &args, None).unwrap_err();
        assert_eq!(
            err,
            KeyError::MissingIdColumns {
                missing: vec!["id".to_string()]
            }
        );
    }

    #[test]
    fn test_build_id_key_null_column_is_missing() {
        let args = record(json!({"id": null}));
        assert!(matches!(
            keys().build_id_key("user", &["id"], &args, None),
            Err(KeyError::MissingIdColumns { .. })
        ));
    }

    #[test]
    fn test_build_id_key_uses_mapped_record() {
        let rename = |record: &ArgsRecord| {
            let mut mapped = ArgsRecord::new();
            if let Some(value) = record.get("userId") {
                mapped.insert("id".to_string(), value.clone());
            }
            mapped
        };
        let args = record(json!({"userId": 11}));

        assert_eq!(
            keys().build_id_key("user", &["id"], &args, Some(&rename)).unwrap(),
            "ns:user:idKey:id:11"
        );
        assert!(keys().build_id_key("user", &["id"], &args, None).is_err());
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value("Ann "), "ann-");
        assert_eq!(normalize_value("  lead"), "-lead");
        assert_eq!(normalize_value("MiXeD"), "mixed");
        assert_eq!(normalize_value(""), "");
    }
}
