//! Storage for the identity of the signed in principal.
//!
//! The cache is hydrated once when constructed and is only written by the session gate.
//! Writers always replace the whole [`Identity`] so readers never observe a partial record.
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use anyhow::Context;
use anyhow::Result;

use repairdesk_auth::Identity;

/// Unable to read the persisted identity cache.
#[derive(Debug, thiserror::Error)]
#[error("unable to read the persisted identity cache at '{path}'")]
pub struct CacheLoadFailed {
    pub path: String,
}

/// Unable to persist the identity cache.
#[derive(Debug, thiserror::Error)]
#[error("unable to persist the identity cache to '{path}'")]
pub struct CachePersistFailed {
    pub path: String,
}

/// Shared handle to the identity cache.
#[derive(Clone)]
pub struct IdentityCache(Arc<dyn IdentityCacheBackend>);

impl IdentityCache {
    /// Remove the cached identity.
    pub fn clear(&self) -> Result<()> {
        self.0.clear()
    }

    /// Open an identity cache persisted to a JSON file.
    pub fn file<P>(path: P) -> Result<IdentityCache>
    where
        P: Into<PathBuf>,
    {
        let cache = FileCache::open(path)?;
        Ok(IdentityCache::from(cache))
    }

    /// Return the cached identity, if any.
    pub fn get(&self) -> Option<Identity> {
        self.0.get()
    }

    /// Create an identity cache kept only in memory.
    pub fn memory() -> IdentityCache {
        IdentityCache::from(MemoryCache::default())
    }

    /// Replace the cached identity.
    pub fn set(&self, identity: Identity) -> Result<()> {
        self.0.set(identity)
    }
}

impl<T> From<T> for IdentityCache
where
    T: IdentityCacheBackend + 'static,
{
    fn from(value: T) -> Self {
        IdentityCache(Arc::new(value))
    }
}

/// Operations implemented by identity cache storage.
///
/// Implementations must update their in-memory view even when persisting it fails.
pub trait IdentityCacheBackend: Send + Sync {
    /// Remove the cached identity.
    fn clear(&self) -> Result<()>;

    /// Return the cached identity, if any.
    fn get(&self) -> Option<Identity>;

    /// Replace the cached identity.
    fn set(&self, identity: Identity) -> Result<()>;
}

/// Identity cache kept only in memory.
#[derive(Default)]
pub struct MemoryCache {
    identity: RwLock<Option<Identity>>,
}

impl MemoryCache {
    fn replace(&self, identity: Option<Identity>) {
        *self
            .identity
            .write()
            .expect("MemoryCache::identity lock poisoned") = identity;
    }
}

impl IdentityCacheBackend for MemoryCache {
    fn clear(&self) -> Result<()> {
        self.replace(None);
        Ok(())
    }

    fn get(&self) -> Option<Identity> {
        self.identity
            .read()
            .expect("MemoryCache::identity lock poisoned")
            .clone()
    }

    fn set(&self, identity: Identity) -> Result<()> {
        self.replace(Some(identity));
        Ok(())
    }
}

/// Identity cache persisted to a JSON file so it survives restarts.
pub struct FileCache {
    memory: MemoryCache,
    path: PathBuf,
}

impl FileCache {
    /// Open the cache and hydrate it from the file, if it exists.
    ///
    /// A file that can't be decoded is treated as an empty cache: the identity is
    /// re-derived from the Identity Service by the next session check anyway.
    pub fn open<P>(path: P) -> Result<FileCache>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        let identity = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).ok(),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => {
                let path = path.display().to_string();
                return Err(error).context(CacheLoadFailed { path });
            }
        };
        let memory = MemoryCache {
            identity: RwLock::new(identity),
        };
        Ok(FileCache { memory, path })
    }

    fn persist_failed(&self) -> CachePersistFailed {
        CachePersistFailed {
            path: self.path.display().to_string(),
        }
    }
}

impl IdentityCacheBackend for FileCache {
    fn clear(&self) -> Result<()> {
        self.memory.replace(None);
        match std::fs::remove_file(&self.path) {
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            result => result.with_context(|| self.persist_failed()),
        }
    }

    fn get(&self) -> Option<Identity> {
        self.memory.get()
    }

    fn set(&self, identity: Identity) -> Result<()> {
        let data = serde_json::to_vec(&identity).with_context(|| self.persist_failed())?;
        self.memory.replace(Some(identity));
        std::fs::write(&self.path, data).with_context(|| self.persist_failed())
    }
}

#[cfg(test)]
mod tests {
    use repairdesk_auth::Identity;
    use repairdesk_auth::Role;

    use super::IdentityCache;

    fn identity(id: &str, role: Role) -> Identity {
        Identity {
            id: id.into(),
            email: format!("{}@shop.example", id),
            full_name: None,
            role: Some(role),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn memory_replaces_identity() {
        let cache = IdentityCache::memory();
        assert_eq!(cache.get(), None);
        cache.set(identity("tech", Role::Technician)).unwrap();
        cache.set(identity("desk", Role::FrontDesk)).unwrap();
        assert_eq!(cache.get(), Some(identity("desk", Role::FrontDesk)));
        cache.clear().unwrap();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn file_hydrates_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let cache = IdentityCache::file(&path).unwrap();
        assert_eq!(cache.get(), None);
        cache.set(identity("tech", Role::Technician)).unwrap();

        let reopened = IdentityCache::file(&path).unwrap();
        assert_eq!(reopened.get(), Some(identity("tech", Role::Technician)));

        reopened.clear().unwrap();
        assert!(!path.exists());
        let reopened = IdentityCache::file(&path).unwrap();
        assert_eq!(reopened.get(), None);
    }

    #[test]
    fn file_ignores_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = IdentityCache::file(&path).unwrap();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn file_clear_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IdentityCache::file(dir.path().join("identity.json")).unwrap();
        cache.clear().unwrap();
    }
}
