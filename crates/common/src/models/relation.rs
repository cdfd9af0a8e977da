//! Embedded relation normalization
//!
//! The store returns an embedded relation as a single object for
//! many-to-one joins and as an array for one-to-many joins. Wire structs
//! hold it as `Option<OneOrMany<T>>` and collapse it with `into_first`.

use serde::{Deserialize, Serialize};

/// An embedded relation in either of its wire shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Collapse to at most one value (the first element of an array)
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.into_iter().next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plan {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Wire {
        #[serde(default)]
        plans: Option<OneOrMany<Plan>>,
    }

    fn first(value: Value) -> Option<Plan> {
        serde_json::from_value::<Wire>(value)
            .unwrap()
            .plans
            .and_then(OneOrMany::into_first)
    }

    #[test]
    fn test_object_and_single_element_array_agree() {
        let a = first(json!({ "plans": { "name": "Pro" } }));
        let b = first(json!({ "plans": [{ "name": "Pro" }] }));
        assert_eq!(a, b);
        assert_eq!(a.unwrap().name, "Pro");
    }

    #[test]
    fn test_absent_shapes_are_none() {
        assert!(first(json!({ "plans": [] })).is_none());
        assert!(first(json!({ "plans": null })).is_none());
        assert!(first(json!({})).is_none());
    }

    #[test]
    fn test_untagged_enum_takes_first() {
        let many: OneOrMany<Plan> =
            serde_json::from_value(json!([{ "name": "Starter" }, { "name": "Pro" }])).unwrap();
        assert_eq!(many.into_first().unwrap().name, "Starter");

        let one: OneOrMany<Plan> = serde_json::from_value(json!({ "name": "Pro" })).unwrap();
        assert_eq!(one.into_first().unwrap().name, "Pro");
    }
}
