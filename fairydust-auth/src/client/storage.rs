use crate::error::AuthError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Persistent key/value backend behind the credential store.
///
/// Batch operations are atomic with respect to each other.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError>;
    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AuthError> {
    mutex
        .lock()
        .map_err(|_| AuthError::TokenStorage("Storage lock poisoned".to_string()))
}

/// In-process storage. Shared between embeds by cloning the `Arc` it lives in.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let mut map = lock(&self.entries)?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        let mut map = lock(&self.entries)?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// JSON file of key/value entries, rewritten whole on every batch.
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    /// Storage under the user cache directory (`~/.cache/fairydust/credentials.json`).
    pub fn new() -> Result<Self, AuthError> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| AuthError::Configuration("Could not find cache directory".to_string()))?
            .join("fairydust");
        Self::with_path(cache_dir.join("credentials.json"))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AuthError::TokenStorage(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, AuthError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::TokenStorage(format!("Failed to read credentials: {}", e)))?;
        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(entries)?;

        fs::write(&self.path, json)
            .map_err(|e| AuthError::TokenStorage(format!("Failed to save credentials: {}", e)))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)
                .map_err(|e| {
                    AuthError::TokenStorage(format!("Failed to get file permissions: {}", e))
                })?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(|e| {
                AuthError::TokenStorage(format!("Failed to set file permissions: {}", e))
            })?;
        }

        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let _guard = lock(&self.guard)?;
        let mut map = self.read_all()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        self.write_all(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        let _guard = lock(&self.guard)?;
        let mut map = self.read_all()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.write_all(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("fairydust-test-{}", uuid::Uuid::new_v4()))
            .join("credentials.json")
    }

    #[test]
    fn test_memory_storage_batches() {
        let storage = MemoryStorage::new();
        storage.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.get("b").unwrap().as_deref(), Some("2"));

        storage.remove_many(&["a", "b"]).unwrap();
        assert!(storage.get("a").unwrap().is_none());
        assert!(storage.get("b").unwrap().is_none());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let path = temp_path();
        {
            let storage = FileStorage::with_path(&path).unwrap();
            storage.set_many(&[("token", "abc")]).unwrap();
        }

        let storage = FileStorage::with_path(&path).unwrap();
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc"));

        storage.remove_many(&["token"]).unwrap();
        assert!(storage.get("token").unwrap().is_none());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path();
        let storage = FileStorage::with_path(&path).unwrap();
        storage.set_many(&[("token", "abc")]).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let storage = FileStorage::with_path(temp_path()).unwrap();
        assert!(storage.get("anything").unwrap().is_none());
        // Removing from an empty store does not create the file
        storage.remove_many(&["anything"]).unwrap();
        assert!(!storage.path().exists());
    }
}
