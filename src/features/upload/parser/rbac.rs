use serde_json::{json, Map, Value};

use super::{invalid, missing, named, string_list, ParseError};

pub const ALLOWED_VERBS: &[&str] = &["get", "list", "create", "update", "patch", "delete", "*"];

pub const SUBJECT_KINDS: &[&str] = &["User", "Group", "ServiceAccount"];

/// Kubernetes と同じく top-level に書いても spec の下に書いてもよい
fn section<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    doc.get(key)
        .or_else(|| doc.get("spec").and_then(|spec| spec.get(key)))
        .filter(|value| !value.is_null())
}

fn object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| invalid(field, "must be a mapping"))
}

fn non_empty_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a str, ParseError> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(field))
}

pub(super) fn role(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let rules = section(doc, "rules")
        .ok_or_else(|| missing("rules"))?
        .as_array()
        .ok_or_else(|| invalid("rules", "must be a list"))?;

    if rules.is_empty() {
        return Err(invalid("rules", "must contain at least one rule"));
    }

    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let field = format!("rules[{}]", i);
            let rule = object(rule, &field)?;

            let verbs_field = format!("{}.verbs", field);
            let verbs = string_list(
                rule.get("verbs").ok_or_else(|| missing(&verbs_field))?,
                &verbs_field,
            )?;

            if verbs.is_empty() {
                return Err(invalid(verbs_field, "must contain at least one verb"));
            }

            if let Some(verb) = verbs
                .iter()
                .find(|verb| !ALLOWED_VERBS.contains(&verb.as_str()))
            {
                return Err(invalid(
                    verbs_field,
                    format!(
                        "unsupported verb \"{}\" (allowed: {})",
                        verb,
                        ALLOWED_VERBS.join(", ")
                    ),
                ));
            }

            let resources_field = format!("{}.resources", field);
            let resources = string_list(
                rule.get("resources")
                    .ok_or_else(|| missing(&resources_field))?,
                &resources_field,
            )?;

            let api_groups = match rule.get("apiGroups") {
                None | Some(Value::Null) => vec![String::new()],
                Some(value) => string_list(value, &format!("{}.apiGroups", field))?,
            };

            let mut normalized = Map::new();
            normalized.insert("apiGroups".into(), json!(api_groups));
            normalized.insert("resources".into(), json!(resources));
            normalized.insert("verbs".into(), json!(verbs));

            if let Some(value) = rule.get("resourceNames").filter(|v| !v.is_null()) {
                let names = string_list(value, &format!("{}.resourceNames", field))?;
                normalized.insert("resourceNames".into(), json!(names));
            }

            Ok(Value::Object(normalized))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut payload = named(name);

    payload.insert("kind".into(), "Role".into());
    payload.insert("rules".into(), Value::Array(rules));

    Ok(Value::Object(payload))
}

fn role_ref(value: &Value) -> Result<Value, ParseError> {
    let role_ref = object(value, "roleRef")?;

    let kind = non_empty_str(role_ref, "kind", "roleRef.kind")?;

    if kind != "Role" {
        return Err(invalid(
            "roleRef.kind",
            format!("must be \"Role\", got \"{}\"", kind),
        ));
    }

    let name = non_empty_str(role_ref, "name", "roleRef.name")?;

    let mut normalized = Map::new();
    normalized.insert("kind".into(), kind.into());
    normalized.insert("name".into(), name.into());

    if let Some(api_group) = role_ref.get("apiGroup").and_then(Value::as_str) {
        normalized.insert("apiGroup".into(), api_group.into());
    }

    Ok(Value::Object(normalized))
}

pub(super) fn role_binding(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let role_ref = role_ref(section(doc, "roleRef").ok_or_else(|| missing("roleRef"))?)?;

    let subjects = section(doc, "subjects")
        .ok_or_else(|| missing("subjects"))?
        .as_array()
        .ok_or_else(|| invalid("subjects", "must be a list"))?;

    if subjects.is_empty() {
        return Err(invalid("subjects", "must contain at least one subject"));
    }

    let subjects = subjects
        .iter()
        .enumerate()
        .map(|(i, subject)| {
            let field = format!("subjects[{}]", i);
            let subject = object(subject, &field)?;

            let kind = non_empty_str(subject, "kind", &format!("{}.kind", field))?;

            if !SUBJECT_KINDS.contains(&kind) {
                return Err(invalid(
                    format!("{}.kind", field),
                    format!(
                        "unsupported subject kind \"{}\" (allowed: {})",
                        kind,
                        SUBJECT_KINDS.join(", ")
                    ),
                ));
            }

            let name = non_empty_str(subject, "name", &format!("{}.name", field))?;

            let mut normalized = Map::new();
            normalized.insert("kind".into(), kind.into());
            normalized.insert("name".into(), name.into());

            if let Some(api_group) = subject.get("apiGroup").and_then(Value::as_str) {
                normalized.insert("apiGroup".into(), api_group.into());
            }

            Ok(Value::Object(normalized))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut payload = named(name);

    payload.insert("kind".into(), "RoleBinding".into());
    payload.insert("roleRef".into(), role_ref);
    payload.insert("subjects".into(), Value::Array(subjects));

    Ok(Value::Object(payload))
}

pub(super) fn service_account(name: &str, doc: &Value) -> Result<Value, ParseError> {
    let mut payload = named(name);

    if let Some(value) = section(doc, "roleRef") {
        payload.insert("roleRef".into(), role_ref(value)?);
    }

    Ok(Value::Object(payload))
}
