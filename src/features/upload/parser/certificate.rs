use serde_json::Value;

use super::{copy_fields, invalid, named, optional_list, required_str, spec, ParseError};

pub(super) fn certificate(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let subject = required_str(&spec, "subject", "spec.subject")?;

    let hosts = optional_list(&spec, "hosts", "spec.hosts")?;

    if let Value::Array(hosts) = &hosts {
        if hosts.iter().any(|host| !host.is_string()) {
            return Err(invalid("spec.hosts", "must be a list of strings"));
        }
    }

    let mut payload = named(name);

    payload.insert("subject".into(), subject.into());
    payload.insert("hosts".into(), hosts);

    copy_fields(&spec, &mut payload, &["expiration"]);

    match spec.get("ca") {
        None | Some(Value::Null) => {}
        Some(ca @ Value::Object(_)) => {
            payload.insert("ca".into(), ca.clone());
        }
        Some(_) => return Err(invalid("spec.ca", "must be a mapping")),
    }

    Ok(Value::Object(payload))
}

pub(super) fn certificate_authority(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let ca_type = required_str(&spec, "type", "spec.type")?;

    let mut payload = named(name);

    payload.insert("type".into(), ca_type.into());

    copy_fields(
        &spec,
        &mut payload,
        &["subject", "expiration", "secretName", "cert", "key"],
    );

    Ok(Value::Object(payload))
}
