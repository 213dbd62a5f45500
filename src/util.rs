pub mod id_generator;
pub mod tracing;

pub mod json {
    use serde_json::{Map, Value};

    /// Deep merge `b` into `a`; a null in `b` removes the key.
    pub fn merge(a: &mut Value, b: Value) {
        if let Value::Object(a) = a
            && let Value::Object(b) = b
        {
            merge_obj(a, b);
            return;
        }
        *a = b;
    }

    pub fn merge_obj(a: &mut Map<String, Value>, b: Map<String, Value>) {
        for (k, v) in b {
            if v.is_null() {
                a.remove(&k);
            } else {
                merge(a.entry(k).or_insert(Value::Null), v);
            }
        }
    }

}
