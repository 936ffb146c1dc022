//! Insert-only result store.
//!
//! During collection the store is owned by the collector's aggregator, which
//! is the only writer; workers hand their results over a channel. Once
//! collection ends the store is frozen into [`FrozenResults`], the read-only
//! view scoring and reporting work from.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::executor::types::{Category, TaskResult, TaskStatus};

#[derive(Debug, Default)]
pub struct ResultStore {
    results: HashMap<String, TaskResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: HashMap::with_capacity(capacity),
        }
    }

    /// Record `result` under its task name. The first result for a name wins.
    pub fn insert(&mut self, result: TaskResult) -> Result<(), StoreError> {
        if self.results.contains_key(&result.name) {
            return Err(StoreError::DuplicateResult(result.name));
        }
        self.results.insert(result.name.clone(), result);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn freeze(self) -> FrozenResults {
        FrozenResults {
            results: self.results.into_iter().collect(),
        }
    }
}

/// Read-only results of a finished collection, keyed and iterated by task name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrozenResults {
    results: BTreeMap<String, TaskResult>,
}

impl FrozenResults {
    /// Build a frozen store directly, with the same uniqueness rule as inserts.
    pub fn from_results<I>(results: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = TaskResult>,
    {
        let mut store = ResultStore::new();
        for r in results {
            store.insert(r)?;
        }
        Ok(store.freeze())
    }

    pub fn get(&self, name: &str) -> Option<&TaskResult> {
        self.results.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Results in lexicographic task-name order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.values()
    }

    /// Results grouped by category; names stay sorted inside each group.
    pub fn by_category(&self) -> BTreeMap<Category, Vec<&TaskResult>> {
        let mut groups: BTreeMap<Category, Vec<&TaskResult>> = BTreeMap::new();
        for r in self.results.values() {
            groups.entry(r.category).or_default().push(r);
        }
        groups
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.values().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::TaskSpec;

    fn result(name: &str, category: Category, status: TaskStatus) -> TaskResult {
        TaskResult::new(&TaskSpec::test(name, category, "true"), status)
    }

    #[test]
    fn rejects_second_result_for_same_task() {
        let mut store = ResultStore::new();
        store.insert(result("dns_google", Category::Dns, TaskStatus::Ok)).unwrap();
        let err = store
            .insert(result("dns_google", Category::Dns, TaskStatus::Failed))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateResult("dns_google".into()));

        let frozen = store.freeze();
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen.get("dns_google").unwrap().status, TaskStatus::Ok);
    }

    #[test]
    fn frozen_view_is_sorted_regardless_of_insert_order() {
        let mut store = ResultStore::new();
        for name in ["youtube_ping", "facebook_ping", "gateway_ping"] {
            store.insert(result(name, Category::Latency, TaskStatus::Ok)).unwrap();
        }
        store.insert(result("airport", Category::LinkQuality, TaskStatus::Failed)).unwrap();

        let frozen = store.freeze();
        let names: Vec<_> = frozen.names().collect();
        assert_eq!(names, ["airport", "facebook_ping", "gateway_ping", "youtube_ping"]);

        let groups = frozen.by_category();
        let latency: Vec<_> = groups[&Category::Latency].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(latency, ["facebook_ping", "gateway_ping", "youtube_ping"]);
        assert_eq!(frozen.count(TaskStatus::Failed), 1);
    }

    #[test]
    fn from_results_applies_uniqueness() {
        let dup = FrozenResults::from_results([
            result("a", Category::System, TaskStatus::Ok),
            result("a", Category::System, TaskStatus::Ok),
        ]);
        assert!(dup.is_err());
    }
}
