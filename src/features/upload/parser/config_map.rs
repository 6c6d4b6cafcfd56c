use serde_json::Value;

use super::{invalid, named, spec, string_map, ParseError};

pub(super) fn config_map(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let immutable = match spec.get("immutable").or_else(|| doc.get("immutable")) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(invalid("spec.immutable", "must be a boolean")),
    };

    let data = string_map(doc.get("data"), "data")?;

    let mut payload = named(name);

    payload.insert("immutable".into(), immutable.into());
    payload.insert("data".into(), Value::Object(data));

    Ok(Value::Object(payload))
}
