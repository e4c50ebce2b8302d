//! Conversion of foreign MCP tool schemas into clean parameter schemas.
//!
//! The server's `inputSchema` objects carry vendor extensions and draft
//! keywords the providers reject. Conversion rebuilds each schema keeping
//! only the recognized shapes; anything unrecognized degrades to an
//! unconstrained passthrough instead of failing the tool load.

use serde_json::{Map, Value, json};

/// Rebuilds a foreign parameter schema into the supported subset.
pub fn convert_schema(schema: &Value) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => convert_object(schema),
        Some("array") => convert_array(schema),
        Some("string") => convert_string(schema),
        Some("number") | Some("integer") => with_description(schema, json!({"type": "number"})),
        Some("boolean") => with_description(schema, json!({"type": "boolean"})),
        Some("null") => json!({"type": "null"}),
        // Unconstrained passthrough for unions, $refs, and anything else.
        _ => json!({}),
    }
}

fn convert_object(schema: &Value) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!("object"));

    let mut properties = Map::new();
    if let Some(Value::Object(props)) = schema.get("properties") {
        for (key, value) in props {
            properties.insert(key.clone(), convert_schema(value));
        }
    }
    out.insert("properties".into(), Value::Object(properties));

    if let Some(Value::Array(required)) = schema.get("required") {
        let required: Vec<Value> = required
            .iter()
            .filter(|v| v.is_string())
            .cloned()
            .collect();
        if !required.is_empty() {
            out.insert("required".into(), Value::Array(required));
        }
    }

    copy_description(schema, &mut out);
    Value::Object(out)
}

fn convert_array(schema: &Value) -> Value {
    let items = schema.get("items").map_or_else(|| json!({}), convert_schema);
    let mut out = Map::new();
    out.insert("type".into(), json!("array"));
    out.insert("items".into(), items);
    copy_description(schema, &mut out);
    Value::Object(out)
}

fn convert_string(schema: &Value) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!("string"));
    if let Some(Value::Array(variants)) = schema.get("enum") {
        let variants: Vec<Value> = variants.iter().filter(|v| v.is_string()).cloned().collect();
        if !variants.is_empty() {
            out.insert("enum".into(), Value::Array(variants));
        }
    }
    copy_description(schema, &mut out);
    Value::Object(out)
}

fn with_description(source: &Value, base: Value) -> Value {
    let Value::Object(mut out) = base else {
        return base;
    };
    copy_description(source, &mut out);
    Value::Object(out)
}

fn copy_description(source: &Value, out: &mut Map<String, Value>) {
    if let Some(description) = source.get("description").and_then(Value::as_str) {
        out.insert("description".into(), json!(description));
    }
}
