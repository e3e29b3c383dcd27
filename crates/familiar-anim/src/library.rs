use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{AnimationDefinition, AreaPulse, FrameSequence, Raycast};

/// Named animation definitions, looked up case-insensitively per kind.
///
/// A sequence and a raycast may share a name; within one kind a later insert
/// replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    sequences: HashMap<String, Arc<FrameSequence>>,
    raycasts: HashMap<String, Arc<Raycast>>,
    areas: HashMap<String, Arc<AreaPulse>>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition. Returns `true` if it replaced one of the same kind and name.
    pub fn insert(&mut self, definition: AnimationDefinition) -> bool {
        let key = definition.name().to_lowercase();
        match definition {
            AnimationDefinition::Sequence(s) => self.sequences.insert(key, Arc::new(s)).is_some(),
            AnimationDefinition::Raycast(r) => self.raycasts.insert(key, Arc::new(r)).is_some(),
            AnimationDefinition::Area(a) => self.areas.insert(key, Arc::new(a)).is_some(),
        }
    }

    pub fn sequence(&self, name: &str) -> Option<Arc<FrameSequence>> {
        self.sequences.get(&name.to_lowercase()).cloned()
    }

    pub fn raycast(&self, name: &str) -> Option<Arc<Raycast>> {
        self.raycasts.get(&name.to_lowercase()).cloned()
    }

    pub fn area(&self, name: &str) -> Option<Arc<AreaPulse>> {
        self.areas.get(&name.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.sequences.len() + self.raycasts.len() + self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display names of every definition, sorted, as `kind:name`.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sequences
            .values()
            .map(|s| format!("sequence:{}", s.name))
            .chain(self.raycasts.values().map(|r| format!("raycast:{}", r.name)))
            .chain(self.areas.values().map(|a| format!("area:{}", a.name)))
            .collect();
        names.sort();
        names
    }
}
