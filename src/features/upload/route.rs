use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use thiserror::Error;

use crate::controller::ControllerRequest;

use super::{
    existence::{fetch_listing, matches_identity},
    kind::ResourceKind,
    parser::ParsedResource,
};

/// パスの1セグメントとして安全でない文字
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
}

impl Route {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("{kind} \"{identifier}\" was not found in the current listing")]
    NotFound {
        kind: ResourceKind,
        identifier: String,
    },
    #[error("{kind} \"{identifier}\" has no {field} in the current listing")]
    MissingField {
        kind: ResourceKind,
        identifier: String,
        field: &'static str,
    },
    #[error("failed to look up {kind} \"{identifier}\": {reason}")]
    Lookup {
        kind: ResourceKind,
        identifier: String,
        reason: String,
    },
    #[error("agent \"{0}\" does not exist; AgentConfig can only update an existing agent")]
    AgentRequired(String),
}

/// 種類と存在有無からメソッドとパスを決める
///
/// 更新のパスは identifier をそのまま使う。uuid や id が必要な種類は [`resolve_route`] を使う
pub fn route(kind: ResourceKind, identifier: &str, exists: bool) -> Route {
    let collection = kind.collection_path();

    let member = || format!("{}/{}", collection, encode_segment(identifier));

    match kind {
        ResourceKind::ApplicationTemplate => Route::new(Method::PUT, member()),
        ResourceKind::CatalogItem => Route::new(Method::POST, collection),
        ResourceKind::AgentConfig => Route::new(Method::PATCH, member()),
        _ if exists => Route::new(kind.update_method(), member()),
        _ => Route::new(Method::POST, collection),
    }
}

/// 更新のパスに使うフィールド
fn lookup_field(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Registry => Some("id"),
        ResourceKind::Microservice | ResourceKind::Agent | ResourceKind::AgentConfig => {
            Some("uuid")
        }
        _ => None,
    }
}

fn path_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 最新の一覧から uuid や id を引いてルートを決める
pub async fn resolve_route<C: ControllerRequest + ?Sized>(
    client: &C,
    resource: &ParsedResource,
    exists: bool,
) -> Result<Route, RoutingError> {
    let kind = resource.kind;
    let identifier = resource.identifier.as_str();

    if kind == ResourceKind::AgentConfig && !exists {
        return Err(RoutingError::AgentRequired(identifier.to_string()));
    }

    let (Some(field), Some(listing), true) = (lookup_field(kind), kind.listing(), exists) else {
        return Ok(route(kind, identifier, exists));
    };

    let items = fetch_listing(client, listing)
        .await
        .map_err(|err| RoutingError::Lookup {
            kind,
            identifier: identifier.to_string(),
            reason: err.to_string(),
        })?;

    let item = items
        .iter()
        .find(|item| matches_identity(kind.identity(), item, identifier))
        .ok_or_else(|| RoutingError::NotFound {
            kind,
            identifier: identifier.to_string(),
        })?;

    let value = item
        .get(field)
        .and_then(path_value)
        .ok_or_else(|| RoutingError::MissingField {
            kind,
            identifier: identifier.to_string(),
            field,
        })?;

    Ok(route(kind, &value, true))
}

/// 送信直前のペイロードの調整
pub fn request_body(kind: ResourceKind, parsed: &Value) -> Value {
    match kind {
        // APIは明示的な null を受け付けない
        ResourceKind::VolumeMount => {
            let mut body = parsed.clone();

            if let Value::Object(map) = &mut body {
                for key in ["secretName", "configMapName"] {
                    if map.get(key).is_some_and(Value::is_null) {
                        map.remove(key);
                    }
                }
            }

            body
        }
        ResourceKind::ConfigMap => serde_json::json!({
            "name": parsed.get("name").cloned().unwrap_or(Value::Null),
            "immutable": parsed.get("immutable").and_then(Value::as_bool).unwrap_or(false),
            "data": parsed
                .get("data")
                .filter(|data| data.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        }),
        _ => parsed.clone(),
    }
}
