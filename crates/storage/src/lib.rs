//! Key-value persistence modeled after browser local storage.
//!
//! Values are plain strings. Typed access goes through [`read_json`] and
//! [`encode_json`], which never surface decode failures to the caller.

pub mod codec;
pub mod error;
pub mod file;
pub mod memory;

pub use codec::{encode_json, read_json};
pub use error::{StorageError, StorageResult};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Last-write-wins string store.
pub trait KeyValueStore {
    /// Returns the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Replaces the value stored under `key`.
    fn set(&mut self, key: &str, value: String) -> StorageResult<()>;

    /// Replaces several values as one write.
    fn set_many(&mut self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl<T> KeyValueStore for &mut T
where
    T: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> StorageResult<()> {
        (**self).set_many(entries)
    }
}
