use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use super::{invalid, named, spec, string_map, ParseError};

const SECRET_TYPES: &[&str] = &["Opaque", "tls"];

pub(super) fn secret(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let secret_type = match spec.get("type").or_else(|| doc.get("type")) {
        None | Some(Value::Null) => "Opaque",
        Some(Value::String(t)) if SECRET_TYPES.contains(&t.as_str()) => t.as_str(),
        Some(other) => {
            return Err(invalid(
                "spec.type",
                format!(
                    "unsupported secret type {} (expected one of {})",
                    other,
                    SECRET_TYPES.join(", ")
                ),
            ))
        }
    };

    let mut data = string_map(doc.get("data"), "data")?;

    // stringData は base64 に変換して data に統合する
    for (key, value) in string_map(doc.get("stringData"), "stringData")? {
        let plain = value.as_str().unwrap_or_default();
        data.insert(key, STANDARD.encode(plain).into());
    }

    if data.is_empty() {
        return Err(invalid("data", "must contain at least one entry"));
    }

    let mut payload = named(name);

    payload.insert("type".into(), secret_type.into());
    payload.insert("data".into(), Value::Object(data));

    Ok(Value::Object(payload))
}
