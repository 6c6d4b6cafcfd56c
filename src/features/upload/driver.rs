use std::{collections::HashMap, future::Future, path::Path, sync::Arc};

use anyhow::Result;
use crossbeam::channel::Sender;
use futures::future::{BoxFuture, FutureExt as _};
use http::StatusCode;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{controller::ControllerRequest, error::UploadError, logger, message::Message};

use super::{
    existence::ResourceExistenceCache,
    kind::ResourceKind,
    message::{CurrentResource, Feedback, UploadMessage, UploadProgress, UploadResult},
    parser::{parse, DocumentError, ParsedResource},
    route::{request_body, resolve_route, RoutingError},
};

pub type RefreshHook = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

pub type RefreshHooks = HashMap<ResourceKind, RefreshHook>;

pub type CompletionCallback = Box<dyn Fn(&BatchOutcome) + Send + Sync>;

pub type SharedUploadStatus = Arc<RwLock<UploadStatus>>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    #[default]
    Idle,
    Parsing,
    Resolving,
    /// 処理中のリソースの位置（0始まり）
    Deploying(usize),
    Summarizing,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    phase: UploadPhase,
    progress: Option<UploadProgress>,
}

impl UploadStatus {
    pub fn shared() -> SharedUploadStatus {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn is_processing(&self) -> bool {
        self.phase != UploadPhase::Idle
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn progress(&self) -> Option<&UploadProgress> {
        self.progress.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

/// 1回のバッチの結果
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchOutcome {
    /// 入力の順番と同じ
    pub results: Vec<UploadResult>,
    pub parse_errors: Vec<DocumentError>,
    /// ファイルを読めなかったときのエラー
    pub fatal: Option<String>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.parse_errors.is_empty() && self.failed() == 0
    }
}

/// YAMLのリソースを順番にControllerへ反映する
pub struct Uploader<C> {
    client: C,
    tx: Sender<Message>,
    refresh_hooks: RefreshHooks,
    on_complete: Option<CompletionCallback>,
    status: SharedUploadStatus,
}

impl<C: ControllerRequest> Uploader<C> {
    pub fn new(client: C, tx: Sender<Message>) -> Self {
        Self {
            client,
            tx,
            refresh_hooks: HashMap::new(),
            on_complete: None,
            status: UploadStatus::shared(),
        }
    }

    /// 反映に成功したときに呼ぶ処理を種類ごとに登録する
    pub fn refresh_hook<F, Fut>(mut self, kind: ResourceKind, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.refresh_hooks
            .insert(kind, Box::new(move || hook().boxed()));
        self
    }

    pub fn on_complete(mut self, callback: impl Fn(&BatchOutcome) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn status(&self) -> SharedUploadStatus {
        self.status.clone()
    }

    fn send(&self, message: impl Into<Message>) {
        if let Err(err) = self.tx.send(message.into()) {
            logger!(error, "Failed to send upload message: {}", err);
        }
    }

    async fn set_phase(&self, phase: UploadPhase) {
        logger!(debug, "upload phase: {:?}", phase);
        self.status.write().await.phase = phase;
    }

    /// バッチを終えて待機状態に戻す。進捗は破棄する
    async fn finish(&self) {
        logger!(debug, "upload phase: {:?}", UploadPhase::Idle);

        let mut status = self.status.write().await;
        status.phase = UploadPhase::Idle;
        status.progress = None;
    }

    async fn publish_progress(&self, progress: UploadProgress) {
        self.status.write().await.progress = Some(progress.clone());
        self.send(progress);
    }

    /// ファイルを読み込んで反映する
    ///
    /// 読み込めないファイルやUTF-8でないファイルはバッチ全体を中断する
    pub async fn process_yaml_file(&self, path: impl AsRef<Path>) -> BatchOutcome {
        let path = path.as_ref();

        self.set_phase(UploadPhase::Parsing).await;

        match read_text(path).await {
            Ok(content) => {
                logger!(info, "Processing {}", path.display());
                self.process_yaml(&content).await
            }
            Err(err) => {
                logger!(error, "{}", err);

                self.send(Feedback::error(err.to_string()));

                let outcome = BatchOutcome {
                    fatal: Some(err.to_string()),
                    ..Default::default()
                };

                self.finish().await;
                self.complete(&outcome);

                outcome
            }
        }
    }

    pub async fn process_yaml(&self, content: &str) -> BatchOutcome {
        self.set_phase(UploadPhase::Parsing).await;
        self.status.write().await.progress = None;

        let parsed = parse(content);

        for err in &parsed.errors {
            logger!(warn, "Skipped {}", err);
            self.send(Feedback::error(err.to_string()));
        }

        let mut outcome = BatchOutcome {
            parse_errors: parsed.errors.clone(),
            ..Default::default()
        };

        if parsed.resources.is_empty() {
            self.set_phase(UploadPhase::Summarizing).await;

            self.send(Feedback::warning("No valid resources found in the YAML file"));
            self.send(UploadMessage::Completed {
                succeeded: 0,
                failed: 0,
            });

            self.finish().await;
            self.complete(&outcome);

            return outcome;
        }

        self.set_phase(UploadPhase::Resolving).await;

        let cache = ResourceExistenceCache::preload(parsed.kinds(), &self.client).await;

        let total = parsed.resources.len();

        self.publish_progress(UploadProgress {
            total,
            processed: 0,
            current: None,
        })
        .await;

        for (i, resource) in parsed.resources.iter().enumerate() {
            self.set_phase(UploadPhase::Deploying(i)).await;

            let result = match self.deploy(&cache, resource).await {
                Ok(action) => {
                    logger!(info, "{} \"{}\" {}", resource.kind, resource.identifier, action);

                    self.refresh(resource.kind).await;

                    UploadResult::succeeded(
                        resource.kind,
                        &resource.identifier,
                        format!("{} \"{}\" {}", resource.kind, resource.identifier, action),
                    )
                }
                Err(err) => {
                    logger!(
                        error,
                        "Failed to deploy {} \"{}\": {}",
                        resource.kind,
                        resource.identifier,
                        err
                    );

                    UploadResult::failed(
                        resource.kind,
                        &resource.identifier,
                        format!(
                            "Failed to deploy {} \"{}\": {}",
                            resource.kind, resource.identifier, err
                        ),
                    )
                }
            };

            self.send(Feedback::from(&result));
            outcome.results.push(result);

            self.publish_progress(UploadProgress {
                total,
                processed: i + 1,
                current: Some(CurrentResource {
                    kind: resource.kind,
                    identifier: resource.identifier.clone(),
                }),
            })
            .await;

            tokio::task::yield_now().await;
        }

        self.set_phase(UploadPhase::Summarizing).await;

        let succeeded = outcome.succeeded();
        let failed = outcome.failed();

        if failed == 0 {
            self.send(Feedback::success(format!(
                "Successfully deployed {} resource(s)",
                succeeded
            )));
        } else {
            self.send(Feedback::warning(format!(
                "{} succeeded, {} failed",
                succeeded, failed
            )));
        }

        self.send(UploadMessage::Completed { succeeded, failed });

        self.finish().await;
        self.complete(&outcome);

        outcome
    }

    /// 1リソースを反映する。成功したときは行った操作を返す
    async fn deploy(
        &self,
        cache: &ResourceExistenceCache,
        resource: &ParsedResource,
    ) -> Result<&'static str, DeployError> {
        let exists = cache.exists_resource(resource, &self.client).await;

        let route = resolve_route(&self.client, resource, exists).await?;

        let body = request_body(resource.kind, &resource.parsed);

        logger!(
            info,
            "Deploying {} \"{}\" [{} {}]",
            resource.kind,
            resource.identifier,
            route.method,
            route.path
        );

        let res = self
            .client
            .request(route.method.clone(), &route.path, Some(body))
            .await
            .map_err(|err| DeployError::Transport(err.to_string()))?;

        if !res.is_ok() {
            return Err(DeployError::Rejected {
                status: res.status(),
                message: res.error_message(),
            });
        }

        let action = match (resource.kind.checks_existence(), exists) {
            (false, _) => "deployed",
            (true, true) => "updated",
            (true, false) => "created",
        };

        Ok(action)
    }

    /// 失敗してもバッチは続ける
    async fn refresh(&self, kind: ResourceKind) {
        if let Some(hook) = self.refresh_hooks.get(&kind) {
            if let Err(err) = hook().await {
                logger!(warn, "Failed to refresh {}: {}", kind, err);
            }
        }
    }

    fn complete(&self, outcome: &BatchOutcome) {
        if let Some(callback) = &self.on_complete {
            callback(outcome);
        }
    }
}

async fn read_text(path: &Path) -> Result<String, UploadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
        path: path.display().to_string(),
        source,
    })?;

    String::from_utf8(bytes).map_err(|_| UploadError::NotText {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use crossbeam::channel::{unbounded, Receiver};
    use http::Method;
    use indoc::{formatdoc, indoc};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::{
        controller::{
            mock::{json_response, MockTestControllerClient},
            ControllerResponse,
        },
        features::upload::message::FeedbackType,
        mock_expect,
    };

    use super::*;

    const SECRET: &str = indoc! {"
        apiVersion: datasance.com/v3
        kind: Secret
        metadata:
          name: db-credentials
        spec:
          type: Opaque
        data:
          username: YWRtaW4=
    "};

    const CONFIG_MAP: &str = indoc! {"
        apiVersion: datasance.com/v3
        kind: ConfigMap
        metadata:
          name: app-config
        data:
          LOG_LEVEL: debug
    "};

    const ACCOUNT_RULE: &str = indoc! {"
        apiVersion: datasance.com/v3
        kind: NatsAccountRule
        metadata:
          name: default-account
        spec:
          limits:
            conn: 100
    "};

    fn microservice(name: &str) -> String {
        formatdoc! {"
            apiVersion: datasance.com/v3
            kind: Microservice
            metadata:
              name: {name}
            spec:
              application: health-care
              agent:
                name: edge-1
              images:
                x86: example/{name}:latest
            ",
            name = name
        }
    }

    fn documents(docs: &[&str]) -> String {
        docs.join("---\n")
    }

    fn ok(value: Value) -> Result<ControllerResponse> {
        Ok(json_response(StatusCode::OK, value))
    }

    fn feedbacks(rx: &Receiver<Message>) -> Vec<Feedback> {
        rx.try_iter()
            .filter_map(|m| match m {
                Message::Upload(UploadMessage::Feedback(feedback)) => Some(feedback),
                _ => None,
            })
            .collect()
    }

    /// 作成したリソースを一覧に反映する Controller
    #[derive(Default)]
    struct FakeController {
        store: Mutex<HashMap<String, Vec<Value>>>,
        calls: Mutex<Vec<(Method, String)>>,
    }

    impl FakeController {
        fn writes(&self) -> Vec<(Method, String)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(method, _)| *method != Method::GET)
                .cloned()
                .collect()
        }

        fn count(&self, collection: &str) -> usize {
            self.store
                .lock()
                .unwrap()
                .get(collection)
                .map_or(0, Vec::len)
        }
    }

    #[async_trait::async_trait]
    impl ControllerRequest for FakeController {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<Value>,
        ) -> Result<ControllerResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((method.clone(), path.to_string()));

            let mut store = self.store.lock().unwrap();

            if method == Method::GET {
                let items = store.get(path).cloned().unwrap_or_default();
                return ok(Value::Array(items));
            }

            if method == Method::POST {
                let items = store.entry(path.to_string()).or_default();
                let mut body = body.unwrap_or_else(|| json!({}));
                body["uuid"] = json!(format!("uuid-{}", items.len()));
                items.push(body);
                return Ok(json_response(StatusCode::CREATED, json!({})));
            }

            let (collection, id) = path.rsplit_once('/').unwrap();

            let found = store.get(collection).is_some_and(|items| {
                items
                    .iter()
                    .any(|item| item["uuid"] == id || item["name"] == id)
            });

            if found {
                ok(json!({}))
            } else {
                Ok(json_response(
                    StatusCode::NOT_FOUND,
                    json!({"message": format!("{} not found", id)}),
                ))
            }
        }
    }

    #[tokio::test]
    async fn 同じファイルを2回反映すると2回目は更新になる() {
        let content = documents(&[SECRET, CONFIG_MAP, &microservice("heart-rate")]);

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(FakeController::default(), tx);

        let first = uploader.process_yaml(&content).await;

        assert!(first.is_success());
        assert_eq!(
            uploader.client.writes(),
            vec![
                (Method::POST, "/api/v3/secrets".to_string()),
                (Method::POST, "/api/v3/configmaps".to_string()),
                (Method::POST, "/api/v3/microservices".to_string()),
            ]
        );

        uploader.client.calls.lock().unwrap().clear();

        let second = uploader.process_yaml(&content).await;

        assert!(second.is_success());
        assert_eq!(
            uploader.client.writes(),
            vec![
                (Method::PATCH, "/api/v3/secrets/db-credentials".to_string()),
                (Method::PATCH, "/api/v3/configmaps/app-config".to_string()),
                (Method::PATCH, "/api/v3/microservices/uuid-0".to_string()),
            ]
        );

        assert_eq!(uploader.client.count("/api/v3/secrets"), 1);
        assert_eq!(uploader.client.count("/api/v3/configmaps"), 1);
        assert_eq!(uploader.client.count("/api/v3/microservices"), 1);
        assert!(second.results.iter().all(|r| r.message.ends_with("updated")));
    }

    #[tokio::test]
    async fn 一部が失敗しても残りのリソースを処理し順番を保つ() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (Method::GET, "/api/v3/secrets", ok(json!({"secrets": []}))),
                (Method::GET, "/api/v3/configmaps", ok(json!({"configMaps": []}))),
                (Method::GET, "/api/v3/nats/account-rules", ok(json!({"rules": []}))),
                (
                    Method::POST,
                    "/api/v3/secrets",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
                (
                    Method::POST,
                    "/api/v3/configmaps",
                    Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"message": "database is locked"})
                    ))
                ),
                (
                    Method::POST,
                    "/api/v3/nats/account-rules",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
            ]
        );

        let (tx, rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(&documents(&[SECRET, CONFIG_MAP, ACCOUNT_RULE]))
            .await;

        assert_eq!(
            outcome
                .results
                .iter()
                .map(|r| (r.resource_kind, r.success))
                .collect::<Vec<_>>(),
            vec![
                (ResourceKind::Secret, true),
                (ResourceKind::ConfigMap, false),
                (ResourceKind::NatsAccountRule, true),
            ]
        );
        assert_eq!(
            outcome.results[1].message,
            "Failed to deploy ConfigMap \"app-config\": database is locked"
        );

        let feedbacks = feedbacks(&rx);

        assert_eq!(
            feedbacks.last(),
            Some(&Feedback::warning("2 succeeded, 1 failed"))
        );
        assert_eq!(
            feedbacks
                .iter()
                .filter(|f| f.kind == FeedbackType::Error)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn 一覧apiは同じ種類のリソースの数によらず一度だけ呼ぶ() {
        let mut client = MockTestControllerClient::new();

        client
            .expect_request()
            .with(
                mockall::predicate::eq(Method::GET),
                mockall::predicate::eq("/api/v3/microservices"),
                mockall::predicate::always(),
            )
            .times(1)
            .returning(|_, _, _| ok(json!({"microservices": []})));

        client
            .expect_request()
            .with(
                mockall::predicate::eq(Method::POST),
                mockall::predicate::eq("/api/v3/microservices"),
                mockall::predicate::always(),
            )
            .times(5)
            .returning(|_, _, _| Ok(json_response(StatusCode::CREATED, json!({}))));

        let names = ["m1", "m2", "m3", "m4", "m5"].map(microservice);
        let docs: Vec<&str> = names.iter().map(String::as_str).collect();

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader.process_yaml(&documents(&docs)).await;

        assert_eq!(outcome.succeeded(), 5);
    }

    #[tokio::test]
    async fn volume_mountのnullのキーは送信しない() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            Method::GET,
            "/api/v3/volumeMounts",
            ok(json!({"volumeMounts": []}))
        );

        client
            .expect_request()
            .with(
                mockall::predicate::eq(Method::POST),
                mockall::predicate::eq("/api/v3/volumeMounts"),
                mockall::predicate::function(|body: &Option<Value>| {
                    body.as_ref().is_some_and(|body| {
                        body.get("secretName").is_none() && body["configMapName"] == "app-config"
                    })
                }),
            )
            .times(1)
            .returning(|_, _, _| Ok(json_response(StatusCode::CREATED, json!({}))));

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(indoc! {"
                apiVersion: datasance.com/v3
                kind: VolumeMount
                metadata:
                  name: certs
                spec:
                  configMapName: app-config
            "})
            .await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn 有効なリソースがないときリクエストせずに終了する() {
        for content in ["", "null\n", "---\n~\n"] {
            let client = MockTestControllerClient::new();

            let (tx, rx) = unbounded();
            let uploader = Uploader::new(client, tx);

            let outcome = uploader.process_yaml(content).await;

            assert_eq!(outcome, BatchOutcome::default());
            assert_eq!(
                feedbacks(&rx),
                vec![Feedback::warning("No valid resources found in the YAML file")]
            );
            let status = uploader.status();
            let status = status.read().await;

            assert!(!status.is_processing());
            assert!(status.progress().is_none());
        }
    }

    #[tokio::test]
    async fn cluster_roleを参照するrole_bindingは反映しない() {
        let client = MockTestControllerClient::new();

        let (tx, rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(indoc! {"
                apiVersion: datasance.com/v3
                kind: RoleBinding
                metadata:
                  name: admin-binding
                roleRef:
                  kind: ClusterRole
                  name: admin
                subjects:
                  - kind: User
                    name: alice
            "})
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.parse_errors.len(), 1);
        assert!(outcome.parse_errors[0].to_string().contains("ClusterRole"));

        let feedbacks = feedbacks(&rx);

        assert_eq!(feedbacks[0].kind, FeedbackType::Error);
        assert!(feedbacks[0].message.contains("roleRef.kind"));
    }

    #[tokio::test]
    async fn 既存のマイクロサービスは最新のuuidで更新する() {
        let mut client = MockTestControllerClient::new();

        client
            .expect_request()
            .with(
                mockall::predicate::eq(Method::GET),
                mockall::predicate::eq("/api/v3/microservices"),
                mockall::predicate::always(),
            )
            .times(2)
            .returning(|_, _, _| {
                ok(json!({"microservices": [{"name": "heart-rate", "uuid": "a1b2"}]}))
            });

        mock_expect!(
            client,
            Method::PATCH,
            "/api/v3/microservices/a1b2",
            ok(json!({}))
        );

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader.process_yaml(&microservice("heart-rate")).await;

        assert_eq!(
            outcome.results,
            vec![UploadResult::succeeded(
                ResourceKind::Microservice,
                "heart-rate",
                "Microservice \"heart-rate\" updated"
            )]
        );
    }

    #[tokio::test]
    async fn uuidが見つからないときそのリソースだけ失敗する() {
        let mut client = MockTestControllerClient::new();

        let mut listed = 0;

        client
            .expect_request()
            .with(
                mockall::predicate::eq(Method::GET),
                mockall::predicate::eq("/api/v3/microservices"),
                mockall::predicate::always(),
            )
            .returning(move |_, _, _| {
                listed += 1;

                // 事前取得の後に削除された
                if listed == 1 {
                    ok(json!([{"name": "heart-rate", "uuid": "a1b2"}]))
                } else {
                    ok(json!([]))
                }
            });

        mock_expect!(client, Method::GET, "/api/v3/secrets", ok(json!([])));
        mock_expect!(
            client,
            Method::POST,
            "/api/v3/secrets",
            Ok(json_response(StatusCode::CREATED, json!({})))
        );

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(&documents(&[&microservice("heart-rate"), SECRET]))
            .await;

        assert!(!outcome.results[0].success);
        assert!(outcome.results[0].message.contains("was not found"));
        assert!(outcome.results[1].success);
    }

    #[tokio::test]
    async fn テンプレートとカタログは一覧を取得せずに反映する() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (
                    Method::PUT,
                    "/api/v3/applicationTemplate/edge-template",
                    ok(json!({}))
                ),
                (
                    Method::POST,
                    "/api/v3/catalog/microservices",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
            ]
        );

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(indoc! {"
                apiVersion: datasance.com/v3
                kind: ApplicationTemplate
                metadata:
                  name: edge-template
                spec:
                  application:
                    microservices: []
                ---
                apiVersion: datasance.com/v3
                kind: CatalogItem
                metadata:
                  name: sensor
                spec:
                  x86: example/sensor
            "})
            .await;

        assert_eq!(outcome.succeeded(), 2);
        assert!(outcome.results.iter().all(|r| r.message.ends_with("deployed")));
    }

    #[tokio::test]
    async fn 一覧の取得に失敗した種類は作成する() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (
                    Method::GET,
                    "/api/v3/secrets",
                    Err(anyhow::anyhow!("connection reset"))
                ),
                (Method::GET, "/api/v3/configmaps", ok(json!([{"name": "app-config"}]))),
                (
                    Method::POST,
                    "/api/v3/secrets",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
                (Method::PATCH, "/api/v3/configmaps/app-config", ok(json!({}))),
            ]
        );

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml(&documents(&[SECRET, CONFIG_MAP]))
            .await;

        assert!(outcome.is_success());
        assert!(outcome.results[0].message.ends_with("created"));
        assert!(outcome.results[1].message.ends_with("updated"));
    }

    #[tokio::test]
    async fn 成功したときだけ種類ごとのrefreshを呼ぶ() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (Method::GET, "/api/v3/secrets", ok(json!([]))),
                (Method::GET, "/api/v3/configmaps", ok(json!([]))),
                (
                    Method::POST,
                    "/api/v3/secrets",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
                (
                    Method::POST,
                    "/api/v3/configmaps",
                    Ok(json_response(StatusCode::BAD_REQUEST, json!({"error": "invalid"})))
                ),
            ]
        );

        let secrets = Arc::new(AtomicUsize::new(0));
        let config_maps = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let (tx, _rx) = unbounded();

        let uploader = Uploader::new(client, tx)
            .refresh_hook(ResourceKind::Secret, {
                let secrets = secrets.clone();
                move || {
                    let secrets = secrets.clone();
                    async move {
                        secrets.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(anyhow::anyhow!("refresh failures are only logged"))
                    }
                }
            })
            .refresh_hook(ResourceKind::ConfigMap, {
                let config_maps = config_maps.clone();
                move || {
                    let config_maps = config_maps.clone();
                    async move {
                        config_maps.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), anyhow::Error>(())
                    }
                }
            })
            .on_complete({
                let completed = completed.clone();
                move |outcome| {
                    completed.fetch_add(outcome.results.len(), Ordering::SeqCst);
                }
            });

        let outcome = uploader
            .process_yaml(&documents(&[SECRET, CONFIG_MAP]))
            .await;

        assert!(outcome.results[0].success);
        assert_eq!(outcome.results[1].message, "Failed to deploy ConfigMap \"app-config\": invalid");
        assert_eq!(secrets.load(Ordering::SeqCst), 1);
        assert_eq!(config_maps.load(Ordering::SeqCst), 0);
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn リソースごとに進捗を通知する() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (Method::GET, "/api/v3/secrets", ok(json!([]))),
                (Method::GET, "/api/v3/configmaps", ok(json!([]))),
                (
                    Method::POST,
                    "/api/v3/secrets",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
                (
                    Method::POST,
                    "/api/v3/configmaps",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
            ]
        );

        let (tx, rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        uploader
            .process_yaml(&documents(&[SECRET, CONFIG_MAP]))
            .await;

        let progress: Vec<UploadProgress> = rx
            .try_iter()
            .filter_map(|m| match m {
                Message::Upload(UploadMessage::Progress(p)) => Some(p),
                _ => None,
            })
            .collect();

        assert_eq!(
            progress
                .iter()
                .map(|p| (p.processed, p.total))
                .collect::<Vec<_>>(),
            vec![(0, 2), (1, 2), (2, 2)]
        );
        assert_eq!(
            progress.last().and_then(|p| p.current.clone()),
            Some(CurrentResource {
                kind: ResourceKind::ConfigMap,
                identifier: "app-config".into()
            })
        );

        let status = uploader.status();
        let status = status.read().await;

        assert_eq!(status.phase(), UploadPhase::Idle);
        assert!(status.progress().is_none());
    }

    #[tokio::test]
    async fn 読み込めないファイルはバッチ全体を中断する() {
        let client = MockTestControllerClient::new();

        let (tx, rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader
            .process_yaml_file("/nonexistent/ecn-deploy/resources.yaml")
            .await;

        assert!(outcome.results.is_empty());
        assert!(outcome.fatal.is_some());

        let feedbacks = feedbacks(&rx);

        assert_eq!(feedbacks.len(), 1);
        assert_eq!(feedbacks[0].kind, FeedbackType::Error);

        let status = uploader.status();
        let status = status.read().await;

        assert_eq!(status.phase(), UploadPhase::Idle);
        assert!(status.progress().is_none());
    }

    #[tokio::test]
    async fn 前のバッチの進捗は次のファイルの読み込みに失敗しても残らない() {
        let mut client = MockTestControllerClient::new();

        mock_expect!(
            client,
            [
                (Method::GET, "/api/v3/configmaps", ok(json!([]))),
                (
                    Method::POST,
                    "/api/v3/configmaps",
                    Ok(json_response(StatusCode::CREATED, json!({})))
                ),
            ]
        );

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        uploader.process_yaml(CONFIG_MAP).await;

        uploader
            .process_yaml_file("/nonexistent/ecn-deploy/resources.yaml")
            .await;

        let status = uploader.status();
        let status = status.read().await;

        assert!(!status.is_processing());
        assert!(status.progress().is_none());
    }

    #[tokio::test]
    async fn utf8でないファイルはバッチ全体を中断する() {
        let path = std::env::temp_dir().join(format!("ecn-deploy-{}.yaml", std::process::id()));
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let client = MockTestControllerClient::new();

        let (tx, _rx) = unbounded();
        let uploader = Uploader::new(client, tx);

        let outcome = uploader.process_yaml_file(&path).await;

        std::fs::remove_file(&path).unwrap();

        assert!(outcome
            .fatal
            .is_some_and(|err| err.contains("not valid UTF-8")));
    }
}
