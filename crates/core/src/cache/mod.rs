mod args;
mod error;
mod keys;
mod options;
mod patterns;
mod serialization;
mod traits;

pub use args::{to_record, ArgsMapper, ArgsRecord};
pub use error::{CacheError, KeyError, Result};
pub use keys::{normalize_value, KeyBuilder, DEFAULT_NAMESPACE, KEY_SEPARATOR};
pub use options::{
    ScanOptions, StoreOptions, DEFAULT_CONN_DELAY_MS, DEFAULT_CONN_TIMEOUT_MS,
    DEFAULT_DELETE_BATCH, DEFAULT_OP_TIMEOUT_MS, DEFAULT_SCAN_COUNT,
};
pub use patterns::pattern_matches;
pub use serialization::{decode_value, encode_if_present, encode_value, is_empty_value};
pub use traits::{Connector, StoreConnection};
