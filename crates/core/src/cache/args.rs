//! Argument records used to derive cache keys.
//!
//! Callers hand the cache an arbitrary argument value. Key construction only
//! ever sees it as an [`ArgsRecord`]: a mapping of field name to JSON value.

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::KeyError;

/// Field name to value mapping that cache keys are derived from.
pub type ArgsRecord = Map<String, Value>;

/// A pure transform applied to an argument record before key derivation.
///
/// Used to drop fields that should not influence the key (pagination tokens,
/// request ids) or to rename fields so different call sites share keys.
/// Any `Fn(&ArgsRecord) -> ArgsRecord` is a mapper.
pub trait ArgsMapper: Send + Sync {
    fn map(&self, record: &ArgsRecord) -> ArgsRecord;
}

impl<F> ArgsMapper for F
where
    F: Fn(&ArgsRecord) -> ArgsRecord + Send + Sync,
{
    fn map(&self, record: &ArgsRecord) -> ArgsRecord {
        self(record)
    }
}

/// Converts any serializable argument value into an [`ArgsRecord`].
///
/// `()` and `None` become the empty record. Scalars and sequences are
/// rejected because they have no field names to build a key from.
pub fn to_record<A: Serialize + ?Sized>(args: &A) -> Result<ArgsRecord, KeyError> {
    match serde_json::to_value(args).map_err(|e| KeyError::NotARecord(e.to_string()))? {
        Value::Object(record) => Ok(record),
        Value::Null => Ok(ArgsRecord::new()),
        other => Err(KeyError::NotARecord(other.to_string())),
    }
}

/// Applies `mapper`, if any, returning the record keys are derived from.
pub(crate) fn apply_mapper(record: &ArgsRecord, mapper: Option<&dyn ArgsMapper>) -> ArgsRecord {
    match mapper {
        Some(mapper) => mapper.map(record),
        None => record.clone(),
    }
}
