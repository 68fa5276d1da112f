use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Opaque reference into the byte-storage collaborator. The core never
/// interprets the contents beyond equality and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(pub String);

impl ObjectRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Durable blob-storage collaborator. `put` with a name hints the stored
/// object's filename; the returned reference is the only durable handle.
///
/// Implementations may be shared across unrelated requests; each call is
/// atomic on its own but no cross-call coordination is assumed.
pub trait ByteStore {
    fn get(&self, reference: &ObjectRef) -> anyhow::Result<Box<dyn Read + Send>>;

    fn put(&self, data: &mut dyn Read, name: Option<&str>) -> anyhow::Result<ObjectRef>;
}

/// In-memory store, primarily for tests and embedding without a durable
/// backend. References look like `mem://3/report.csv`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes directly and return their reference. Test convenience.
    pub fn insert(&self, bytes: impl Into<Vec<u8>>) -> ObjectRef {
        let mut source = Cursor::new(bytes.into());
        self.put(&mut source, None)
            .expect("memory store put is infallible")
    }

    /// Raw contents behind a reference, if present.
    pub fn contents(&self, reference: &ObjectRef) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("memory store poisoned")
            .get(reference.as_str())
            .cloned()
    }
}

impl ByteStore for MemoryStore {
    fn get(&self, reference: &ObjectRef) -> anyhow::Result<Box<dyn Read + Send>> {
        let objects = self.objects.lock().expect("memory store poisoned");
        let bytes = objects
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no object at '{reference}'"))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn put(&self, data: &mut dyn Read, name: Option<&str>) -> anyhow::Result<ObjectRef> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = match name {
            Some(name) => format!("mem://{id}/{name}"),
            None => format!("mem://{id}"),
        };
        self.objects
            .lock()
            .expect("memory store poisoned")
            .insert(key.clone(), bytes);
        Ok(ObjectRef(key))
    }
}
