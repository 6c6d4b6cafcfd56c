mod agent;
mod application;
mod catalog;
mod certificate;
mod config_map;
mod nats;
mod rbac;
mod registry;
mod secret;
mod volume_mount;

use std::{collections::BTreeSet, fmt};

use serde_json::{Map, Value};
use thiserror::Error;

use super::kind::ResourceKind;

pub const SUPPORTED_API_VERSIONS: &[&str] = &["datasance.com/v3", "iofog.org/v3"];

/// 1つのYAMLドキュメントを正規化したもの
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResource {
    pub kind: ResourceKind,
    /// 存在確認と表示に使う識別子（Registry は URL、それ以外は metadata.name）
    pub identifier: String,
    /// APIにそのまま送れる形に変換したペイロード
    pub parsed: Value,
    pub original_doc: Value,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(String),
    #[error("document is not a mapping")]
    NotMapping,
    #[error("missing field \"{0}\"")]
    MissingField(String),
    #[error("unsupported apiVersion \"{0}\"")]
    UnsupportedApiVersion(String),
    #[error("unsupported kind \"{0}\"")]
    UnsupportedKind(String),
    #[error("invalid field \"{field}\": {reason}")]
    InvalidField { field: String, reason: String },
}

fn missing(field: impl Into<String>) -> ParseError {
    ParseError::MissingField(field.into())
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidField {
        field: field.into(),
        reason: reason.into(),
    }
}

/// どのドキュメントで失敗したかを含むエラー
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentError {
    /// 1始まり
    pub index: usize,
    pub resource: Option<(ResourceKind, String)>,
    pub error: ParseError,
}

impl DocumentError {
    fn new(index: usize, error: ParseError) -> Self {
        Self {
            index,
            resource: None,
            error,
        }
    }

    fn with_resource(mut self, kind: ResourceKind, identifier: &str) -> Self {
        self.resource = Some((kind, identifier.to_string()));
        self
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "document {}", self.index)?;

        if let Some((kind, identifier)) = &self.resource {
            write!(f, " ({} \"{}\")", kind, identifier)?;
        }

        write!(f, ": {}", self.error)
    }
}

impl std::error::Error for DocumentError {}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseResult {
    pub resources: Vec<ParsedResource>,
    pub errors: Vec<DocumentError>,
}

impl ParseResult {
    pub fn kinds(&self) -> BTreeSet<ResourceKind> {
        self.resources.iter().map(|r| r.kind).collect()
    }
}

/// 複数ドキュメントのYAMLをパースする
///
/// 壊れたドキュメントや未対応の kind は errors に積み、残りのドキュメントは処理を続ける。
/// resources は入力の順番を保つ。
pub fn parse(content: &str) -> ParseResult {
    let mut result = ParseResult::default();

    for (i, chunk) in split_documents(content).into_iter().enumerate() {
        match parse_document(i + 1, chunk) {
            Ok(Some(resource)) => result.resources.push(resource),
            Ok(None) => {}
            Err(err) => result.errors.push(err),
        }
    }

    result
}

fn is_separator(line: &str) -> bool {
    line.strip_prefix("---")
        .is_some_and(|rest| rest.chars().next().map_or(true, char::is_whitespace))
}

fn is_end_marker(line: &str) -> bool {
    line.strip_prefix("...")
        .is_some_and(|rest| rest.chars().next().map_or(true, char::is_whitespace))
}

fn is_blank(chunk: &str) -> bool {
    chunk.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// `%YAML` や `%TAG` などのディレクティブ、空行、コメントだけの部分
fn is_prologue(chunk: &str) -> bool {
    chunk.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line.starts_with('%')
    })
}

/// `---` と `...` でドキュメントごとの文字列に分割する。空のドキュメントは除く
///
/// ドキュメント単位でパースすることで、1つの構文エラーが後続のドキュメントに波及しない。
/// ディレクティブは続くドキュメントに含める。
fn split_documents(content: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    // start が `---` の直後を指しているとき true
    let mut at_separator = false;

    for line in content.split_inclusive('\n') {
        if is_separator(line) {
            let chunk = &content[start..offset];

            if at_separator || !is_prologue(chunk) || is_blank(chunk) {
                chunks.push(chunk);
                // 区切りと同じ行に続く内容は次のドキュメントに含める
                start = offset + 3;
                at_separator = true;
            }
        } else if is_end_marker(line) {
            chunks.push(&content[start..offset]);
            start = offset + line.len();
            at_separator = false;
        }
        offset += line.len();
    }
    chunks.push(&content[start..]);

    chunks.into_iter().filter(|chunk| !is_blank(chunk)).collect()
}

fn parse_document(index: usize, chunk: &str) -> Result<Option<ParsedResource>, DocumentError> {
    let err = |error| DocumentError::new(index, error);

    let doc: Value =
        serde_yaml::from_str(chunk).map_err(|e| err(ParseError::Yaml(e.to_string())))?;

    if doc.is_null() {
        return Ok(None);
    }

    if !doc.is_object() {
        return Err(err(ParseError::NotMapping));
    }

    let api_version = doc
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| err(missing("apiVersion")))?;

    if !SUPPORTED_API_VERSIONS.contains(&api_version) {
        return Err(err(ParseError::UnsupportedApiVersion(
            api_version.to_string(),
        )));
    }

    let kind = doc
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| err(missing("kind")))?;

    let kind: ResourceKind = kind
        .parse()
        .map_err(|_| err(ParseError::UnsupportedKind(kind.to_string())))?;

    let identifier = identifier(kind, &doc).map_err(err)?;

    let parsed = normalize(kind, &identifier, &doc)
        .map_err(|e| err(e).with_resource(kind, &identifier))?;

    Ok(Some(ParsedResource {
        kind,
        identifier,
        parsed,
        original_doc: doc,
    }))
}

fn identifier(kind: ResourceKind, doc: &Value) -> Result<String, ParseError> {
    let (pointer, field) = match kind {
        ResourceKind::Registry => ("/data/url", "data.url"),
        _ => ("/metadata/name", "metadata.name"),
    };

    doc.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| missing(field))
}

fn normalize(kind: ResourceKind, name: &str, doc: &Value) -> Result<Value, ParseError> {
    match kind {
        ResourceKind::Application => application::application(name, doc),
        ResourceKind::ApplicationTemplate => application::application_template(name, doc),
        ResourceKind::Microservice => application::microservice(name, doc),
        ResourceKind::Agent => agent::agent(name, doc),
        ResourceKind::AgentConfig => agent::agent_config(doc),
        ResourceKind::Registry => registry::registry(name, doc),
        ResourceKind::Secret => secret::secret(name, doc),
        ResourceKind::ConfigMap => config_map::config_map(name, doc),
        ResourceKind::VolumeMount => volume_mount::volume_mount(name, doc),
        ResourceKind::CatalogItem => catalog::catalog_item(name, doc),
        ResourceKind::Role => rbac::role(name, doc),
        ResourceKind::RoleBinding => rbac::role_binding(name, doc),
        ResourceKind::ServiceAccount => rbac::service_account(name, doc),
        ResourceKind::NatsAccountRule => nats::account_rule(name, doc),
        ResourceKind::NatsUserRule => nats::user_rule(name, doc),
        ResourceKind::Certificate => certificate::certificate(name, doc),
        ResourceKind::CertificateAuthority => certificate::certificate_authority(name, doc),
    }
}

fn named(name: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("name".into(), name.into());
    payload
}

/// `spec` をマップとして取り出す。ないときは空
fn spec(doc: &Value) -> Result<Map<String, Value>, ParseError> {
    match doc.get("spec") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(spec)) => Ok(spec.clone()),
        Some(_) => Err(invalid("spec", "must be a mapping")),
    }
}

fn required_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a str, ParseError> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        None | Some(Value::Null) | Some(Value::String(_)) => Err(missing(field)),
        Some(_) => Err(invalid(field, "must be a string")),
    }
}

fn optional_list(map: &Map<String, Value>, key: &str, field: &str) -> Result<Value, ParseError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Value::Array(vec![])),
        Some(list @ Value::Array(_)) => Ok(list.clone()),
        Some(_) => Err(invalid(field, "must be a list")),
    }
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>, ParseError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(field, "must be a list of strings"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| invalid(field, "must be a list of strings"))
        })
        .collect()
}

/// null でない値だけをコピーする
fn copy_fields(from: &Map<String, Value>, to: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if let Some(value) = from.get(*key).filter(|v| !v.is_null()) {
            to.insert(key.to_string(), value.clone());
        }
    }
}

/// ConfigMap / Secret の data。スカラー値は文字列に変換する
fn string_map(value: Option<&Value>, field: &str) -> Result<Map<String, Value>, ParseError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(Map::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid(field, "must be a mapping")),
    };

    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => return Err(invalid(format!("{}.{}", field, key), "must be a scalar")),
            };
            Ok((key.clone(), Value::String(value)))
        })
        .collect()
}

/// x86 / arm のイメージを fogTypeId 付きのリストにする
fn fog_images(images: &Map<String, Value>) -> Vec<Value> {
    [("x86", 1), ("arm", 2)]
        .iter()
        .filter_map(|(arch, fog_type_id)| {
            images
                .get(*arch)
                .and_then(Value::as_str)
                .filter(|image| !image.is_empty())
                .map(|image| serde_json::json!({"containerImage": image, "fogTypeId": fog_type_id}))
        })
        .collect()
}

/// remote は 1、local は 2。数値はそのまま
fn registry_id(value: Option<&Value>, field: &str) -> Result<Value, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(1.into()),
        Some(Value::Number(n)) if n.is_u64() => Ok(Value::Number(n.clone())),
        Some(Value::String(s)) => match s.as_str() {
            "remote" => Ok(1.into()),
            "local" => Ok(2.into()),
            other => other
                .parse::<u64>()
                .map(Value::from)
                .map_err(|_| invalid(field, format!("unknown registry \"{}\"", other))),
        },
        Some(_) => Err(invalid(field, "must be \"remote\", \"local\" or a registry id")),
    }
}
