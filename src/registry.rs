//! Keyed cache of mounted controllers, one instance per type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::StateController;
use crate::hub::Hub;

/// Controllers the registry can construct on demand.
pub trait FromHub: StateController {
    fn from_hub(hub: &Hub) -> Self;
}

struct Entry {
    instance: Arc<dyn Any + Send + Sync>,
    dispose: Box<dyn Fn() + Send + Sync>,
}

impl Entry {
    fn new<T: StateController>(controller: &Arc<T>) -> Self {
        let handle = Arc::clone(controller);
        Self {
            instance: Arc::clone(controller) as Arc<dyn Any + Send + Sync>,
            dispose: Box::new(move || handle.dispose()),
        }
    }
}

/// Creates, caches and disposes controllers by type.
pub struct Registry {
    hub: Hub,
    entries: Mutex<HashMap<TypeId, Entry>>,
}

impl Registry {
    pub fn new(hub: &Hub) -> Self {
        Self {
            hub: hub.clone(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// The cached `T`, constructed and mounted on first use.
    pub fn get<T: FromHub>(&self) -> Arc<T> {
        if let Some(existing) = self.lookup::<T>() {
            return existing;
        }

        // Mounting replays the last action into the new controller, so the
        // map lock is not held while constructing.
        let created = T::from_hub(&self.hub).mount();
        let raced = {
            let mut entries = self.entries.lock();
            match entries.get(&TypeId::of::<T>()) {
                Some(entry) => Some(Arc::clone(&entry.instance)),
                None => {
                    entries.insert(TypeId::of::<T>(), Entry::new(&created));
                    None
                }
            }
        };

        match raced.and_then(|instance| instance.downcast::<T>().ok()) {
            Some(existing) => {
                created.dispose();
                existing
            }
            None => {
                tracing::debug!(controller = std::any::type_name::<T>(), "Controller created");
                created
            }
        }
    }

    /// Dispose and forget the cached `T`. Returns false if none was cached.
    pub fn remove<T: StateController>(&self) -> bool {
        let entry = self.entries.lock().remove(&TypeId::of::<T>());
        match entry {
            Some(entry) => {
                (entry.dispose)();
                tracing::debug!(controller = std::any::type_name::<T>(), "Controller removed");
                true
            }
            None => false,
        }
    }

    pub fn contains<T: StateController>(&self) -> bool {
        self.entries.lock().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Dispose and forget every cached controller.
    pub fn clear(&self) {
        let entries: Vec<Entry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            (entry.dispose)();
        }
    }

    fn lookup<T: StateController>(&self) -> Option<Arc<T>> {
        let instance = self
            .entries
            .lock()
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(&entry.instance))?;
        instance.downcast::<T>().ok()
    }
}
