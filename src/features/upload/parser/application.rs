use serde_json::{Map, Value};

use super::{
    copy_fields, fog_images, invalid, missing, named, optional_list, registry_id, required_str,
    spec, ParseError,
};

/// container セクションのキーとAPIのフィールド名
const CONTAINER_FIELDS: &[(&str, &str)] = &[
    ("rootHostAccess", "rootHostAccess"),
    ("ports", "ports"),
    ("volumes", "volumeMappings"),
    ("env", "env"),
    ("commands", "cmd"),
    ("extraHosts", "extraHosts"),
    ("runtime", "runtime"),
    ("platform", "platform"),
    ("runAsUser", "runAsUser"),
    ("ipcMode", "ipcMode"),
    ("pidMode", "pidMode"),
    ("capAdd", "capAdd"),
    ("capDrop", "capDrop"),
    ("cdiDevices", "cdiDevices"),
    ("annotations", "annotations"),
];

pub(super) fn application(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let microservices = match spec.get("microservices") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let field = format!("spec.microservices[{}]", i);

                let item = item
                    .as_object()
                    .ok_or_else(|| invalid(&field, "must be a mapping"))?;

                let name = required_str(item, "name", &format!("{}.name", field))?;

                microservice_payload(name, item, &field).map(Value::Object)
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid("spec.microservices", "must be a list")),
    };

    let mut payload = named(name);

    copy_fields(&spec, &mut payload, &["description", "isSystem", "natsConfig"]);

    payload.insert(
        "isActivated".into(),
        spec.get("isActivated")
            .cloned()
            .unwrap_or(Value::Bool(true)),
    );
    payload.insert("microservices".into(), Value::Array(microservices));
    payload.insert(
        "routes".into(),
        optional_list(&spec, "routes", "spec.routes")?,
    );

    Ok(Value::Object(payload))
}

pub(super) fn application_template(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    // テンプレート変数を含むため application の中身は変換しない
    let application = match spec.get("application") {
        Some(Value::Object(application)) => application.clone(),
        None | Some(Value::Null) => return Err(missing("spec.application")),
        Some(_) => return Err(invalid("spec.application", "must be a mapping")),
    };

    let mut payload = named(name);

    copy_fields(&spec, &mut payload, &["description"]);

    payload.insert(
        "variables".into(),
        optional_list(&spec, "variables", "spec.variables")?,
    );
    payload.insert("application".into(), Value::Object(application));

    Ok(Value::Object(payload))
}

pub(super) fn microservice(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let spec = spec(doc)?;

    let application = required_str(&spec, "application", "spec.application")?.to_string();

    let mut payload = microservice_payload(name, &spec, "spec")?;

    payload.insert("application".into(), application.into());

    Ok(Value::Object(payload))
}

/// Microservice と Application 内の microservices で共通の変換
fn microservice_payload(
    name: &str,
    spec: &Map<String, Value>,
    field: &str,
) -> Result<Map<String, Value>, ParseError> {
    let mut payload = named(name);

    let agent_name = spec
        .get("agent")
        .and_then(|agent| agent.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| missing(format!("{}.agent.name", field)))?;

    payload.insert("agentName".into(), agent_name.into());

    let images = spec
        .get("images")
        .and_then(Value::as_object)
        .ok_or_else(|| missing(format!("{}.images", field)))?;

    match images.get("catalogItemId").filter(|id| !id.is_null()) {
        Some(id) => {
            payload.insert("catalogItemId".into(), id.clone());
        }
        None => {
            let fog_images = fog_images(images);

            if fog_images.is_empty() {
                return Err(invalid(
                    format!("{}.images", field),
                    "requires an x86 or arm image",
                ));
            }

            payload.insert("images".into(), Value::Array(fog_images));
            payload.insert(
                "registryId".into(),
                registry_id(
                    images.get("registry"),
                    &format!("{}.images.registry", field),
                )?,
            );
        }
    }

    match spec.get("container") {
        None | Some(Value::Null) => {}
        Some(Value::Object(container)) => {
            for (from, to) in CONTAINER_FIELDS {
                if let Some(value) = container.get(*from).filter(|v| !v.is_null()) {
                    payload.insert(to.to_string(), value.clone());
                }
            }
        }
        Some(_) => {
            return Err(invalid(
                format!("{}.container", field),
                "must be a mapping",
            ))
        }
    }

    // APIは config をJSON文字列で受け取る
    let config = spec
        .get("config")
        .filter(|config| !config.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    payload.insert("config".into(), Value::String(config.to_string()));

    copy_fields(spec, &mut payload, &["schedule", "natsConfig", "msRoutes"]);

    Ok(payload)
}
