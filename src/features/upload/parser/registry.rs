use serde_json::{Map, Value};

use super::{copy_fields, invalid, missing, ParseError};

pub(super) fn registry(url: &str, doc: &Value) -> Result<Value, ParseError> {
    let data = doc
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("data"))?;

    let mut payload = Map::new();

    payload.insert("url".into(), url.into());

    for key in ["username", "password", "email"] {
        let value = match data.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(invalid(format!("data.{}", key), "must be a string")),
        };
        payload.insert(key.into(), value.into());
    }

    let is_public = match (data.get("isPublic"), data.get("private")) {
        (Some(Value::Bool(public)), _) => *public,
        (_, Some(Value::Bool(private))) => !private,
        (None, None) => true,
        _ => return Err(invalid("data.private", "must be a boolean")),
    };

    payload.insert("isPublic".into(), is_public.into());

    let requires_cert = match data.get("requiresCert") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(invalid("data.requiresCert", "must be a boolean")),
    };

    payload.insert("requiresCert".into(), requires_cert.into());

    copy_fields(data, &mut payload, &["certificate"]);

    if requires_cert && !payload.contains_key("certificate") {
        return Err(missing("data.certificate"));
    }

    Ok(Value::Object(payload))
}
