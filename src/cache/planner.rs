//! Invalidation plan generation.
//!
//! Collects the tags and paths produced for one or many changes into a single
//! deduplicated set before anything touches the cache.

use std::collections::BTreeSet;
use std::fmt;

use super::keys::CacheTag;

/// Tags and paths to invalidate, deduplicated and in stable order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub tags: BTreeSet<CacheTag>,
    pub paths: BTreeSet<String>,
    /// Tag and path requests seen before deduplication.
    pub requested: usize,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ tags: {}, paths: {}, requested: {} }}",
            self.tags.len(),
            self.paths.len(),
            self.requested,
        )
    }
}

impl InvalidationPlan {
    pub fn add_tag(&mut self, tag: CacheTag) {
        self.requested += 1;
        self.tags.insert(tag);
    }

    pub fn add_path(&mut self, path: impl Into<String>) {
        self.requested += 1;
        self.paths.insert(path.into());
    }

    /// Fold another plan into this one.
    pub fn merge(&mut self, other: InvalidationPlan) {
        self.requested += other.requested;
        self.tags.extend(other.tags);
        self.paths.extend(other.paths);
    }

    pub fn from_plans(plans: impl IntoIterator<Item = InvalidationPlan>) -> Self {
        plans.into_iter().fold(Self::default(), |mut acc, plan| {
            acc.merge(plan);
            acc
        })
    }

    /// Requests dropped as duplicates.
    pub fn deduplicated(&self) -> usize {
        self.requested
            .saturating_sub(self.tags.len() + self.paths.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn duplicate_requests_collapse() {
        let mut plan = InvalidationPlan::default();
        plan.add_tag(CacheTag::collection("posts"));
        plan.add_tag(CacheTag::collection("posts"));
        plan.add_path("/news");
        plan.add_path("/news");

        assert_eq!(plan.tags.len(), 1);
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.requested, 4);
        assert_eq!(plan.deduplicated(), 2);
    }

    #[test]
    fn from_plans_merges_across_changes() {
        let shared = CacheTag::collection_index("posts");
        let plans = (0..5).map(|n| {
            let mut plan = InvalidationPlan::default();
            plan.add_tag(CacheTag::item("posts", Uuid::new_v4()));
            plan.add_tag(shared.clone());
            plan.add_path(format!("/news/{n}"));
            plan
        });

        let merged = InvalidationPlan::from_plans(plans);
        assert_eq!(merged.tags.len(), 6);
        assert_eq!(merged.paths.len(), 5);
        assert_eq!(merged.requested, 15);
    }

    #[test]
    fn display_format() {
        let display = format!("{}", InvalidationPlan::default());
        assert!(display.contains("InvalidationPlan"));
        assert!(display.contains("tags: 0"));
    }

    #[test]
    fn is_empty() {
        let mut plan = InvalidationPlan::default();
        assert!(plan.is_empty());
        plan.add_path("/");
        assert!(!plan.is_empty());
    }
}
