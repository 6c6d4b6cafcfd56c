use serde_json::{Map, Value};

use super::{invalid, named, spec, string_list, ParseError};

#[derive(Debug, Clone, Copy)]
enum FieldType {
    Text,
    Integer,
    Bool,
    StringList,
    /// 数値（秒）か "1m" のような文字列
    Duration,
    Any,
}

/// (spec内のJSONポインタ, APIのフィールド名, 型)
type FieldMapping = (&'static str, &'static str, FieldType);

const ACCOUNT_FIELDS: &[FieldMapping] = &[
    ("/description", "description", FieldType::Text),
    ("/infoUrl", "infoUrl", FieldType::Text),
    ("/limits/conn", "maxConnections", FieldType::Integer),
    ("/limits/leaf", "maxLeafNodeConnections", FieldType::Integer),
    ("/limits/data", "maxData", FieldType::Integer),
    ("/limits/exports", "maxExports", FieldType::Integer),
    ("/limits/imports", "maxImports", FieldType::Integer),
    ("/limits/payload", "maxMsgPayload", FieldType::Integer),
    ("/limits/subs", "maxSubscriptions", FieldType::Integer),
    ("/limits/wildcards", "exportsAllowWildcards", FieldType::Bool),
    ("/limits/mem_storage", "memStorage", FieldType::Integer),
    ("/limits/disk_storage", "diskStorage", FieldType::Integer),
    ("/limits/streams", "streams", FieldType::Integer),
    ("/limits/consumer", "consumer", FieldType::Integer),
    ("/limits/max_ack_pending", "maxAckPending", FieldType::Integer),
    ("/limits/mem_max_stream_bytes", "memMaxStreamBytes", FieldType::Integer),
    ("/limits/disk_max_stream_bytes", "diskMaxStreamBytes", FieldType::Integer),
    ("/limits/max_bytes_required", "maxBytesRequired", FieldType::Bool),
    ("/default_permissions/pub/allow", "pubAllow", FieldType::StringList),
    ("/default_permissions/pub/deny", "pubDeny", FieldType::StringList),
    ("/default_permissions/sub/allow", "subAllow", FieldType::StringList),
    ("/default_permissions/sub/deny", "subDeny", FieldType::StringList),
    ("/default_permissions/resp/max", "respMax", FieldType::Integer),
    ("/default_permissions/resp/ttl", "respTtl", FieldType::Duration),
];

const USER_FIELDS: &[FieldMapping] = &[
    ("/description", "description", FieldType::Text),
    ("/subs", "maxSubscriptions", FieldType::Integer),
    ("/payload", "maxPayload", FieldType::Integer),
    ("/data", "maxData", FieldType::Integer),
    ("/bearer_token", "bearerToken", FieldType::Bool),
    (
        "/allowed_connection_types",
        "allowedConnectionTypes",
        FieldType::StringList,
    ),
    ("/src", "src", FieldType::StringList),
    ("/times", "times", FieldType::Any),
    ("/locale", "timesLocation", FieldType::Text),
    ("/pub/allow", "pubAllow", FieldType::StringList),
    ("/pub/deny", "pubDeny", FieldType::StringList),
    ("/sub/allow", "subAllow", FieldType::StringList),
    ("/sub/deny", "subDeny", FieldType::StringList),
    ("/resp/max", "respMax", FieldType::Integer),
    ("/resp/ttl", "respTtl", FieldType::Duration),
];

fn field_name(pointer: &str) -> String {
    format!("spec{}", pointer.replace('/', "."))
}

fn check(value: &Value, field_type: FieldType, pointer: &str) -> Result<Value, ParseError> {
    let mismatch = match field_type {
        FieldType::Text => (!value.is_string()).then_some("a string"),
        // -1 は無制限
        FieldType::Integer => (!value.is_i64()).then_some("an integer"),
        FieldType::Bool => (!value.is_boolean()).then_some("a boolean"),
        FieldType::StringList => {
            string_list(value, &field_name(pointer))?;
            None
        }
        FieldType::Duration => {
            (!value.is_i64() && !value.is_string()).then_some("an integer or a duration string")
        }
        FieldType::Any => None,
    };

    match mismatch {
        Some(expected) => Err(invalid(field_name(pointer), format!("must be {}", expected))),
        None => Ok(value.clone()),
    }
}

/// ネストしたNATSの設定をAPIのフラットな形式にする
fn flatten(name: &str, spec: &Map<String, Value>, fields: &[FieldMapping]) -> Result<Value, ParseError> {
    let spec = Value::Object(spec.clone());

    let mut payload = named(name);

    for (pointer, key, field_type) in fields {
        if let Some(value) = spec.pointer(pointer).filter(|v| !v.is_null()) {
            payload.insert(key.to_string(), check(value, *field_type, pointer)?);
        }
    }

    Ok(Value::Object(payload))
}

pub(super) fn account_rule(name: &str, doc: &Value) -> Result<Value, ParseError> {
    flatten(name, &spec(doc)?, ACCOUNT_FIELDS)
}

pub(super) fn user_rule(name: &str, doc: &Value) -> Result<Value, ParseError> {
    flatten(name, &spec(doc)?, USER_FIELDS)
}
