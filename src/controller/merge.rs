use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde_json::Value;

/// State types that accept a partial update.
///
/// `merge` returns a new value and leaves `self` untouched.
pub trait Merge: Sized {
    type Partial;

    fn merge(&self, partial: Self::Partial) -> Self;
}

/// Objects merge key by key (shallow); any other partial replaces the value.
impl Merge for Value {
    type Partial = Value;

    fn merge(&self, partial: Value) -> Value {
        match (self, partial) {
            (Value::Object(current), Value::Object(patch)) => {
                let mut merged = current.clone();
                for (key, value) in patch {
                    merged.insert(key, value);
                }
                Value::Object(merged)
            }
            (_, replacement) => replacement,
        }
    }
}

impl<K: Ord + Clone, V: Clone> Merge for BTreeMap<K, V> {
    type Partial = BTreeMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut merged = self.clone();
        merged.extend(partial);
        merged
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Merge for HashMap<K, V> {
    type Partial = HashMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut merged = self.clone();
        merged.extend(partial);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_objects_merge_shallowly() {
        let state = json!({"count": 0, "loading": false, "nested": {"a": 1}});
        let merged = state.merge(json!({"count": 1, "nested": {"b": 2}}));
        assert_eq!(
            merged,
            json!({"count": 1, "loading": false, "nested": {"b": 2}})
        );
        assert_eq!(state["count"], 0);
    }

    #[test]
    fn non_object_partial_replaces() {
        assert_eq!(json!({"count": 0}).merge(json!(5)), json!(5));
        assert_eq!(json!(5).merge(json!({"count": 1})), json!({"count": 1}));
    }

    #[test]
    fn sequence_of_merges_equals_shallow_fold() {
        let patches = vec![
            json!({"a": 1}),
            json!({"b": 2}),
            json!({"a": 3, "c": 4}),
        ];
        let result = patches
            .into_iter()
            .fold(json!({"a": 0, "z": 9}), |state, patch| state.merge(patch));
        assert_eq!(result, json!({"a": 3, "z": 9, "b": 2, "c": 4}));
    }

    #[test]
    fn maps_extend() {
        let state = BTreeMap::from([("a", 1), ("b", 2)]);
        let merged = state.merge(BTreeMap::from([("b", 3)]));
        assert_eq!(merged, BTreeMap::from([("a", 1), ("b", 3)]));
    }
}
