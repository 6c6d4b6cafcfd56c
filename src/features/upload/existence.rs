use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;

use crate::{
    controller::{fetch_json, ControllerRequest},
    logger,
};

use super::{
    kind::{Identity, Listing, ResourceKind},
    parser::ParsedResource,
};

/// 一覧APIのレスポンスから要素の配列を取り出す
///
/// 配列そのもの、種類ごとのキーを持つオブジェクト、配列を持つ任意のオブジェクトを受け付ける
pub fn extract_items(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(key) {
                return items;
            }

            map.into_iter()
                .find_map(|(_, value)| match value {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

pub async fn fetch_listing<C: ControllerRequest + ?Sized>(
    client: &C,
    listing: Listing,
) -> Result<Vec<Value>> {
    let value = fetch_json(client, listing.path).await?;

    Ok(extract_items(value, listing.key))
}

/// 存在確認に使う値。Registry は data.url、それ以外は metadata.name
fn identity_value(kind: ResourceKind, parsed: &Value, original_doc: &Value) -> Option<String> {
    let value = match kind.identity() {
        Identity::Url => original_doc
            .pointer("/data/url")
            .or_else(|| parsed.get("url")),
        Identity::Name | Identity::UuidOrName => original_doc
            .pointer("/metadata/name")
            .or_else(|| parsed.get("name")),
    };

    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn field_eq(item: &Value, field: &str, expected: &str) -> bool {
    item.get(field).and_then(Value::as_str) == Some(expected)
}

/// 一覧の要素が同じリソースを指しているか
pub fn matches_identity(identity: Identity, item: &Value, expected: &str) -> bool {
    match identity {
        Identity::Name => field_eq(item, "name", expected),
        Identity::Url => field_eq(item, "url", expected),
        Identity::UuidOrName => field_eq(item, "uuid", expected) || field_eq(item, "name", expected),
    }
}

/// バッチ内で一度だけ取得した一覧のキャッシュ
///
/// 構築後は読み取り専用
#[derive(Debug, Default, Clone)]
pub struct ResourceExistenceCache {
    listings: HashMap<ResourceKind, Vec<Value>>,
}

impl ResourceExistenceCache {
    /// 一覧APIごとに1回だけリクエストする
    ///
    /// 取得に失敗した一覧は空として扱い、他の種類の解決は続ける
    pub async fn preload<C, I>(kinds: I, client: &C) -> Self
    where
        C: ControllerRequest + ?Sized,
        I: IntoIterator<Item = ResourceKind>,
    {
        let mut targets: BTreeMap<&'static str, (Listing, Vec<ResourceKind>)> = BTreeMap::new();

        for kind in kinds {
            if let Some(listing) = kind.listing() {
                let (_, kinds) = targets
                    .entry(listing.path)
                    .or_insert_with(|| (listing, Vec::new()));

                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }

        let fetched = join_all(targets.into_values().map(|(listing, kinds)| async move {
            let items = match fetch_listing(client, listing).await {
                Ok(items) => items,
                Err(err) => {
                    logger!(
                        warn,
                        "Failed to list {}: {}. Assuming no {} exist yet",
                        listing.path,
                        err,
                        kinds
                            .iter()
                            .map(ResourceKind::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    Vec::new()
                }
            };

            (kinds, items)
        }))
        .await;

        let mut listings = HashMap::new();

        for (kinds, items) in fetched {
            for kind in kinds {
                listings.insert(kind, items.clone());
            }
        }

        Self { listings }
    }

    pub fn listing(&self, kind: ResourceKind) -> Option<&[Value]> {
        self.listings.get(&kind).map(Vec::as_slice)
    }

    pub async fn exists<C: ControllerRequest + ?Sized>(
        &self,
        kind: ResourceKind,
        parsed: &Value,
        original_doc: &Value,
        client: &C,
    ) -> bool {
        let Some(listing) = kind.listing() else {
            return false;
        };

        let Some(expected) = identity_value(kind, parsed, original_doc) else {
            return false;
        };

        let identity = kind.identity();

        if let Some(items) = self.listings.get(&kind) {
            return items
                .iter()
                .any(|item| matches_identity(identity, item, &expected));
        }

        match fetch_listing(client, listing).await {
            Ok(items) => items
                .iter()
                .any(|item| matches_identity(identity, item, &expected)),
            Err(err) => {
                logger!(warn, "Failed to list {}: {}", listing.path, err);
                false
            }
        }
    }

    pub async fn exists_resource<C: ControllerRequest + ?Sized>(
        &self,
        resource: &ParsedResource,
        client: &C,
    ) -> bool {
        self.exists(
            resource.kind,
            &resource.parsed,
            &resource.original_doc,
            client,
        )
        .await
    }
}
