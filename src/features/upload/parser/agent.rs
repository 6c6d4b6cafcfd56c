use serde_json::Value;

use super::{invalid, missing, named, spec, ParseError};

/// プロビジョニング用のキーでAPIには送らない
const PROVISIONING_KEYS: &[&str] = &["ssh", "package", "scripts"];

pub(super) fn agent(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let mut spec = spec(doc)?;

    for key in PROVISIONING_KEYS {
        spec.remove(*key);
    }

    let mut payload = named(name);

    match spec.remove("config") {
        None | Some(Value::Null) => {}
        Some(Value::Object(config)) => payload.extend(config),
        Some(_) => return Err(invalid("spec.config", "must be a mapping")),
    }

    // spec 直下の値を config より優先する
    payload.extend(spec);

    payload.insert("name".into(), name.into());

    Ok(Value::Object(payload))
}

/// 既存のAgentに対する設定の更新
pub(super) fn agent_config(doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    if spec.is_empty() {
        return Err(missing("spec"));
    }

    Ok(Value::Object(spec))
}
