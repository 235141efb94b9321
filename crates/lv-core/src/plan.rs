//! Partition planning.
//!
//! Objects are packed greedily, in listing order, into groups whose summed
//! size stays strictly below the threshold. Each group is one unit of
//! parallel work. An object that alone exceeds the threshold still gets a
//! group of its own rather than being dropped.

use serde::{Deserialize, Serialize};

/// One object from a storage listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size_bytes: u64,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
        }
    }
}

/// Objects processed together by one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionGroup {
    pub objects: Vec<ObjectDescriptor>,
    pub size_bytes: u64,
}

impl PartitionGroup {
    fn push(&mut self, object: ObjectDescriptor) {
        self.size_bytes = self.size_bytes.saturating_add(object.size_bytes);
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// A singleton group whose only object is at or above the threshold.
    pub fn is_oversized(&self, threshold: u64) -> bool {
        self.size_bytes >= threshold
    }
}

/// Pack `objects` into groups below `threshold` bytes, preserving order.
///
/// An object joins the current group only if the group's size plus its own
/// is strictly less than the threshold; reaching the threshold exactly
/// closes the group.
pub fn plan_partitions(
    objects: impl IntoIterator<Item = ObjectDescriptor>,
    threshold: u64,
) -> Vec<PartitionGroup> {
    let mut groups = Vec::new();
    let mut current = PartitionGroup::default();

    for object in objects {
        if !current.is_empty() && current.size_bytes.saturating_add(object.size_bytes) >= threshold
        {
            groups.push(std::mem::take(&mut current));
        }
        current.push(object);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
