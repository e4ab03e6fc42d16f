use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::state::{Target, TargetKind};

/// Known conversation targets keyed by id, in the order they were first created.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    targets: IndexMap<String, Target>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a target unless one with the same id already exists.
    ///
    /// An existing target is returned untouched with `is_new = false`; ids and
    /// metadata are never rewritten after creation.
    pub fn upsert(
        &mut self,
        id: impl Into<String>,
        kind: TargetKind,
        display_name: impl Into<String>,
    ) -> (Target, bool) {
        match self.targets.entry(id.into()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let target = Target {
                    id: entry.key().clone(),
                    kind,
                    display_name: display_name.into(),
                };
                entry.insert(target.clone());
                (target, true)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Target> + '_ {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
