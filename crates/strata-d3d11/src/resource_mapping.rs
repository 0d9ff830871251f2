use std::collections::HashMap;

use crate::resources::DeviceObject;

/// Name → object table used to bind many shader variables at once.
///
/// Each name holds an array of objects so that array variables resolve per element.
#[derive(Debug, Clone, Default)]
pub struct ResourceMapping {
    entries: HashMap<String, Vec<Option<DeviceObject>>>,
}

impl ResourceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `name` (element 0) to `object`.
    ///
    /// With `is_unique`, replacing a different object already mapped under the name logs an
    /// error and keeps the old mapping.
    pub fn add(&mut self, name: &str, object: impl Into<DeviceObject>, is_unique: bool) {
        self.add_array(name, 0, [object.into()], is_unique);
    }

    /// Maps elements `first_element..` of `name` to `objects`.
    pub fn add_array(
        &mut self,
        name: &str,
        first_element: u32,
        objects: impl IntoIterator<Item = DeviceObject>,
        is_unique: bool,
    ) {
        let elements = self.entries.entry(name.to_owned()).or_default();
        for (i, object) in objects.into_iter().enumerate() {
            let index = first_element as usize + i;
            if elements.len() <= index {
                elements.resize(index + 1, None);
            }
            if let Some(existing) = &elements[index] {
                if is_unique && !existing.ptr_eq(&object) {
                    tracing::error!(
                        "Resource with name '{}' and array index {} already exists and is marked as unique. The new object '{}' is ignored.",
                        name,
                        index,
                        object.name()
                    );
                    continue;
                }
            }
            elements[index] = Some(object);
        }
    }

    /// Removes one element of `name`; the name itself disappears once every element is gone.
    pub fn remove(&mut self, name: &str, element: u32) {
        let Some(elements) = self.entries.get_mut(name) else {
            return;
        };
        if let Some(slot) = elements.get_mut(element as usize) {
            *slot = None;
        }
        while elements.last().is_some_and(Option::is_none) {
            elements.pop();
        }
        if elements.is_empty() {
            self.entries.remove(name);
        }
    }

    pub fn get(&self, name: &str, element: u32) -> Option<&DeviceObject> {
        self.entries.get(name)?.get(element as usize)?.as_ref()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
