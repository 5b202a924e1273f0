use std::cmp::Ordering;

use serde_json::Value;

use crate::RecordPath;

/// How children of a subscribed location are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Key,
    /// By the value of a named field of each child, then by key.
    Child(String),
}

/// Children subscription over one location of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub path: RecordPath,
    pub order_by: OrderBy,
}

impl Query {
    pub fn children(path: RecordPath) -> Self {
        Self {
            path,
            order_by: OrderBy::Key,
        }
    }

    pub fn order_by_child(mut self, field: impl Into<String>) -> Self {
        self.order_by = OrderBy::Child(field.into());
        self
    }
}

/// Compare two children `(key, value)` under the given ordering.
///
/// Missing fields sort first, then booleans, numbers, strings and objects.
/// Equal sort values fall back to the key.
pub fn compare_children(order_by: &OrderBy, a: (&str, &Value), b: (&str, &Value)) -> Ordering {
    let by_value = match order_by {
        OrderBy::Key => Ordering::Equal,
        OrderBy::Child(field) => compare_values(a.1.get(field), b.1.get(field)),
    };
    by_value.then_with(|| a.0.cmp(b.0))
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn orders_by_field_then_key() {
        let order = OrderBy::Child("timestamp".into());
        let mut children = vec![
            ("k3".to_string(), json!({"timestamp": 20})),
            ("k2".to_string(), json!({"timestamp": 10})),
            ("k1".to_string(), json!({"timestamp": 20})),
            ("k0".to_string(), json!({})),
        ];
        children.sort_by(|a, b| compare_children(&order, (&a.0, &a.1), (&b.0, &b.1)));
        let keys: Vec<_> = children.iter().map(|c| c.0.as_str()).collect();
        assert_eq!(keys, ["k0", "k2", "k1", "k3"]);
    }

    #[test]
    fn key_order_ignores_values() {
        let a = json!({"timestamp": 99});
        let b = json!({"timestamp": 1});
        assert_eq!(
            compare_children(&OrderBy::Key, ("a", &a), ("b", &b)),
            Ordering::Less
        );
    }
}
