use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use super::KeyValueStore;
use super::error::{SerializeValueSnafu, StorageResult};

/// Decodes the JSON value stored under `key`.
///
/// Missing keys and values that do not match `T` both read as `None`; the
/// decode failure is logged and dropped here.
pub fn read_json<T, S>(store: &S, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let raw = store.get(key)?;
    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!("ignoring malformed value under key '{key}': {error}");
            None
        }
    }
}

/// Encodes `value` as the JSON string that would be stored under `key`.
pub fn encode_json<T>(key: &str, value: &T) -> StorageResult<String>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(value).context(SerializeValueSnafu {
        stage: "write-json-encode",
        key: key.to_string(),
    })
}
