//! In-process stand-in for the object API once it starts rate limiting

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockObject {
    pub id: String,
    pub name: String,
    pub data: Map<String, Value>,
    /// Soft-delete marker; never serialized
    #[serde(skip)]
    pub deleted: bool,
}

/// Result of looking an id up in the store
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Live(MockObject),
    Deleted,
    Unknown,
}

/// Objects keyed by id; entries are never removed
#[derive(Debug, Default)]
pub struct MockStore {
    objects: HashMap<String, MockObject>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn create(&mut self, name: &str, data: Map<String, Value>) -> MockObject {
        let mut id = generate_id();
        while self.objects.contains_key(&id) {
            id = generate_id();
        }
        let object = MockObject {
            id: id.clone(),
            name: name.to_string(),
            data,
            deleted: false,
        };
        self.objects.insert(id, object.clone());
        object
    }

    pub fn get(&self, id: &str) -> Lookup {
        match self.objects.get(id) {
            Some(o) if o.deleted => Lookup::Deleted,
            Some(o) => Lookup::Live(o.clone()),
            None => Lookup::Unknown,
        }
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Lookup {
        self.modify(id, |o| o.name = name.to_string())
    }

    /// Shallow-merges `delta` into the object's data.
    pub fn merge_data(&mut self, id: &str, delta: Map<String, Value>) -> Lookup {
        self.modify(id, |o| o.data.extend(delta))
    }

    /// Marks the object deleted; a second delete reports `Deleted`.
    pub fn delete(&mut self, id: &str) -> Lookup {
        match self.objects.get_mut(id) {
            Some(o) if o.deleted => Lookup::Deleted,
            Some(o) => {
                o.deleted = true;
                Lookup::Live(o.clone())
            }
            None => Lookup::Unknown,
        }
    }

    fn modify(&mut self, id: &str, f: impl FnOnce(&mut MockObject)) -> Lookup {
        match self.objects.get_mut(id) {
            Some(o) if o.deleted => Lookup::Deleted,
            Some(o) => {
                f(o);
                Lookup::Live(o.clone())
            }
            None => Lookup::Unknown,
        }
    }
}

/// `mock-<unix millis>-<6 lowercase base36 chars>`
fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(6)
        .collect();
    format!("mock-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}
