//! Dense integer indices for task ids.
//!
//! Graph algorithms work on `u32` indices into plain vectors; strings are only
//! used at the boundaries.

use rustc_hash::FxHashMap;

/// Interned task index (u32 for compact storage and fast hashing).
pub type TaskIdx = u32;

/// Bidirectional map between task id strings and dense indices.
///
/// Indices are assigned in first-seen order, so iteration over `0..len()`
/// follows the input task order.
#[derive(Debug, Clone, Default)]
pub struct TaskIdInterner {
    to_int: FxHashMap<String, TaskIdx>,
    from_int: Vec<String>,
}

impl TaskIdInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_int: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_int: Vec::with_capacity(capacity),
        }
    }

    /// Intern every id in order. Repeated ids keep their first index.
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let iter = ids.into_iter();
        let mut interner = Self::with_capacity(iter.size_hint().0);
        for id in iter {
            interner.intern(id);
        }
        interner
    }

    /// Intern a string, returning its index.
    pub fn intern(&mut self, s: &str) -> TaskIdx {
        if let Some(&idx) = self.to_int.get(s) {
            return idx;
        }
        let idx = self.from_int.len() as TaskIdx;
        self.from_int.push(s.to_string());
        self.to_int.insert(s.to_string(), idx);
        idx
    }

    #[inline]
    pub fn get(&self, s: &str) -> Option<TaskIdx> {
        self.to_int.get(s).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: TaskIdx) -> Option<&str> {
        self.from_int.get(idx as usize).map(|s| s.as_str())
    }

    /// Resolve a sequence of indices, dropping any that are unknown.
    pub fn resolve_all(&self, indices: &[TaskIdx]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&idx| self.resolve(idx))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.from_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_int.is_empty()
    }
}
