use http::Method;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// 取り込み可能なリソースの種類
///
/// YAMLの `kind` と完全一致（大文字小文字を区別）したときのみ変換できる
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, EnumIter, IntoStaticStr,
)]
pub enum ResourceKind {
    Application,
    Microservice,
    Agent,
    AgentConfig,
    Registry,
    Secret,
    ConfigMap,
    VolumeMount,
    ApplicationTemplate,
    CatalogItem,
    Role,
    RoleBinding,
    ServiceAccount,
    NatsAccountRule,
    NatsUserRule,
    Certificate,
    CertificateAuthority,
}

/// 一覧取得APIのパスと、レスポンス中の配列のキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Listing {
    pub path: &'static str,
    pub key: &'static str,
}

/// 既存リソースと同一かを判定するフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Name,
    Url,
    UuidOrName,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub const fn collection_path(&self) -> &'static str {
        match self {
            Self::Application => "/api/v3/applications",
            Self::Microservice => "/api/v3/microservices",
            Self::Agent | Self::AgentConfig => "/api/v3/iofog",
            Self::Registry => "/api/v3/registries",
            Self::Secret => "/api/v3/secrets",
            Self::ConfigMap => "/api/v3/configmaps",
            Self::VolumeMount => "/api/v3/volumeMounts",
            Self::ApplicationTemplate => "/api/v3/applicationTemplate",
            Self::CatalogItem => "/api/v3/catalog/microservices",
            Self::Role => "/api/v3/roles",
            Self::RoleBinding => "/api/v3/rolebindings",
            Self::ServiceAccount => "/api/v3/serviceaccounts",
            Self::NatsAccountRule => "/api/v3/nats/account-rules",
            Self::NatsUserRule => "/api/v3/nats/user-rules",
            Self::Certificate => "/api/v3/certificates",
            Self::CertificateAuthority => "/api/v3/certificates/ca",
        }
    }

    /// 存在確認に使う一覧API
    ///
    /// None のときは存在確認をしない（APIがupsertや重複排除を行う）
    pub const fn listing(&self) -> Option<Listing> {
        let listing = match self {
            Self::Application => Listing {
                path: "/api/v3/applications",
                key: "applications",
            },
            Self::Microservice => Listing {
                path: "/api/v3/microservices",
                key: "microservices",
            },
            Self::Agent | Self::AgentConfig => Listing {
                path: "/api/v3/iofog-list",
                key: "fogs",
            },
            Self::Registry => Listing {
                path: "/api/v3/registries",
                key: "registries",
            },
            Self::Secret => Listing {
                path: "/api/v3/secrets",
                key: "secrets",
            },
            Self::ConfigMap => Listing {
                path: "/api/v3/configmaps",
                key: "configMaps",
            },
            Self::VolumeMount => Listing {
                path: "/api/v3/volumeMounts",
                key: "volumeMounts",
            },
            Self::Role => Listing {
                path: "/api/v3/roles",
                key: "roles",
            },
            Self::RoleBinding => Listing {
                path: "/api/v3/rolebindings",
                key: "bindings",
            },
            Self::ServiceAccount => Listing {
                path: "/api/v3/serviceaccounts",
                key: "serviceAccounts",
            },
            Self::NatsAccountRule => Listing {
                path: "/api/v3/nats/account-rules",
                key: "rules",
            },
            Self::NatsUserRule => Listing {
                path: "/api/v3/nats/user-rules",
                key: "rules",
            },
            Self::Certificate => Listing {
                path: "/api/v3/certificates",
                key: "certificates",
            },
            Self::CertificateAuthority => Listing {
                path: "/api/v3/certificates/ca",
                key: "cas",
            },
            Self::ApplicationTemplate | Self::CatalogItem => return None,
        };

        Some(listing)
    }

    pub const fn checks_existence(&self) -> bool {
        self.listing().is_some()
    }

    pub const fn identity(&self) -> Identity {
        match self {
            Self::Registry => Identity::Url,
            Self::Agent | Self::AgentConfig | Self::Microservice => Identity::UuidOrName,
            _ => Identity::Name,
        }
    }

    pub fn update_method(&self) -> Method {
        match self {
            Self::ApplicationTemplate | Self::NatsAccountRule | Self::NatsUserRule => Method::PUT,
            Self::CatalogItem => Method::POST,
            _ => Method::PATCH,
        }
    }
}
