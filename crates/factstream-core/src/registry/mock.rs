//! In-memory registry with scripted per-attribute behaviors, for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::filter::PatternList;
use crate::model::{AttrInfo, AttrKind, AttrValue, ObjectId, ObjectInfo};
use crate::registry::{ObjectRegistry, RegistryError};

/// What a scripted attribute does when read.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Always returns the same value.
    Value(AttrValue),
    /// Returns values in order, repeating the last one once exhausted.
    Sequence(Vec<AttrValue>),
    /// Always fails with an unsupported-attribute error.
    Fail(String),
    /// Sleeps before answering, to exercise read timeouts.
    Slow(Duration, AttrValue),
}

struct MockAttr {
    info: AttrInfo,
    behavior: Behavior,
    cursor: usize,
    reads: u64,
}

struct MockObject {
    id: ObjectId,
    attrs: Vec<MockAttr>,
}

struct Inner {
    objects: BTreeMap<String, MockObject>,
    online: bool,
}

/// Scriptable in-memory registry.
pub struct MockRegistry {
    inner: Mutex<Inner>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: BTreeMap::new(),
                online: true,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Adds (or replaces) an object with no attributes.
    pub fn add_object(&self, id: ObjectId) {
        let mut inner = self.lock();
        inner
            .objects
            .insert(id.canonical(), MockObject { id, attrs: Vec::new() });
    }

    /// Adds an attribute to an existing object.
    pub fn add_attr(&self, id: &ObjectId, info: AttrInfo, behavior: Behavior) {
        let mut inner = self.lock();
        if let Some(obj) = inner.objects.get_mut(&id.canonical()) {
            obj.attrs.push(MockAttr {
                info,
                behavior,
                cursor: 0,
                reads: 0,
            });
        }
    }

    /// Convenience: object attribute that always returns `value`.
    pub fn add_value(&self, id: &ObjectId, name: &str, value: AttrValue) {
        let kind = match &value {
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Str(_) => AttrKind::Text,
            AttrValue::Bytes(_) => AttrKind::Bytes,
            AttrValue::List(_) => AttrKind::List,
            AttrValue::Map(_) => AttrKind::Map,
            AttrValue::Null => AttrKind::Other,
        };
        self.add_attr(id, AttrInfo::new(name, kind), Behavior::Value(value));
    }

    pub fn remove_object(&self, id: &ObjectId) {
        self.lock().objects.remove(&id.canonical());
    }

    /// Simulates registry connectivity loss/recovery.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Number of raw reads an attribute has seen.
    pub fn read_count(&self, id: &ObjectId, attr: &str) -> u64 {
        let inner = self.lock();
        inner
            .objects
            .get(&id.canonical())
            .and_then(|o| o.attrs.iter().find(|a| a.info.name == attr))
            .map(|a| a.reads)
            .unwrap_or(0)
    }
}

impl ObjectRegistry for MockRegistry {
    fn ping(&self) -> Result<(), RegistryError> {
        if self.lock().online {
            Ok(())
        } else {
            Err(RegistryError::Connect("mock registry offline".to_string()))
        }
    }

    fn query_names(&self, filter: &PatternList) -> Result<Vec<ObjectId>, RegistryError> {
        let inner = self.lock();
        if !inner.online {
            return Err(RegistryError::Connect("mock registry offline".to_string()));
        }
        Ok(inner
            .objects
            .values()
            .filter(|o| filter.matches(&o.id))
            .map(|o| o.id.clone())
            .collect())
    }

    fn object_info(&self, id: &ObjectId) -> Result<ObjectInfo, RegistryError> {
        let inner = self.lock();
        if !inner.online {
            return Err(RegistryError::Connect("mock registry offline".to_string()));
        }
        inner
            .objects
            .get(&id.canonical())
            .map(|o| ObjectInfo::new(o.id.clone(), o.attrs.iter().map(|a| a.info.clone()).collect()))
            .ok_or_else(|| RegistryError::NotFound(id.canonical()))
    }

    fn read_attribute(&self, id: &ObjectId, attr: &str) -> Result<AttrValue, RegistryError> {
        // Resolve the behavior under the lock, sleep outside it so slow
        // attributes do not stall unrelated readers.
        let action = {
            let mut inner = self.lock();
            if !inner.online {
                return Err(RegistryError::Connect("mock registry offline".to_string()));
            }
            let obj = inner
                .objects
                .get_mut(&id.canonical())
                .ok_or_else(|| RegistryError::NotFound(id.canonical()))?;
            let a = obj
                .attrs
                .iter_mut()
                .find(|a| a.info.name == attr)
                .ok_or_else(|| RegistryError::NotFound(format!("{}/{}", id.canonical(), attr)))?;
            a.reads += 1;
            match &a.behavior {
                Behavior::Value(v) => Ok(v.clone()),
                Behavior::Sequence(vals) => {
                    let idx = a.cursor.min(vals.len().saturating_sub(1));
                    a.cursor += 1;
                    vals.get(idx)
                        .cloned()
                        .ok_or_else(|| RegistryError::Unsupported(attr.to_string()))
                }
                Behavior::Fail(msg) => Err(RegistryError::Unsupported(msg.clone())),
                Behavior::Slow(delay, v) => {
                    let (delay, v) = (*delay, v.clone());
                    drop(inner);
                    std::thread::sleep(delay);
                    return Ok(v);
                }
            }
        };
        action
    }
}
