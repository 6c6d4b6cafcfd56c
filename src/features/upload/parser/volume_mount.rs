use serde_json::Value;

use super::{invalid, named, spec, ParseError};

/// secretName か configMapName のどちらか一方だけを参照する
///
/// 参照しない方は null にしておき、送信前に取り除く
pub(super) fn volume_mount(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let reference = |key: &str| -> Result<Option<String>, ParseError> {
        match spec.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(format!("spec.{}", key), "must be a string")),
        }
    };

    let secret_name = reference("secretName")?;
    let config_map_name = reference("configMapName")?;

    match (&secret_name, &config_map_name) {
        (None, None) => {
            return Err(invalid(
                "spec",
                "requires either secretName or configMapName",
            ))
        }
        (Some(_), Some(_)) => {
            return Err(invalid(
                "spec",
                "secretName and configMapName are mutually exclusive",
            ))
        }
        _ => {}
    }

    let mut payload = named(name);

    payload.insert("secretName".into(), secret_name.into());
    payload.insert("configMapName".into(), config_map_name.into());

    Ok(Value::Object(payload))
}
