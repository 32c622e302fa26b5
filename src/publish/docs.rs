//! Google Docs publisher.
//!
//! Upload is three calls: create the document, insert the body in bounded
//! `insertText` batches, then grant `anyone:reader` through Drive. Any failure
//! along the way is a [`PipelineError::PublishFailure`].

use super::{chunk_content, Publisher};
use crate::error::Result;
use crate::types::{Artifact, ArtifactRef};
use crate::PipelineError;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Characters per `insertText` request.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// OAuth scopes the publisher asks for.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/drive",
];

const DOCS_ENDPOINT: &str = "https://docs.googleapis.com";
const DRIVE_ENDPOINT: &str = "https://www.googleapis.com";

/// Supplies bearer tokens for the Docs and Drive APIs.
#[async_trait]
pub trait AccessTokens: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Tokens minted from a Google service-account key file.
///
/// The key is read on first use, so a missing file only fails the upload
/// step, never construction. `gcp_auth` caches tokens until they expire.
pub struct ServiceAccountTokens {
    path: PathBuf,
    account: OnceCell<CustomServiceAccount>,
}

impl std::fmt::Debug for ServiceAccountTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokens")
            .field("path", &self.path)
            .field("loaded", &self.account.initialized())
            .finish()
    }
}

impl ServiceAccountTokens {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            account: OnceCell::new(),
        }
    }

    async fn account(&self) -> Result<&CustomServiceAccount> {
        self.account
            .get_or_try_init(|| async {
                let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                    PipelineError::PublishFailure(format!(
                        "failed to load document store credentials from {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;
                CustomServiceAccount::from_json(&json).map_err(|e| {
                    PipelineError::PublishFailure(format!(
                        "invalid service account key in {}: {}",
                        self.path.display(),
                        e
                    ))
                })
            })
            .await
    }
}

#[async_trait]
impl AccessTokens for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let account = self.account().await?;
        let token = account
            .token(SCOPES)
            .await
            .map_err(|e| PipelineError::PublishFailure(format!("token exchange failed: {}", e)))?;
        Ok(token.as_str().to_string())
    }
}

/// A pre-minted bearer token.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl AccessTokens for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Publishes artifacts as publicly readable Google Docs.
#[derive(Clone)]
pub struct GoogleDocsPublisher {
    client: Client,
    tokens: Arc<dyn AccessTokens>,
    docs_endpoint: String,
    drive_endpoint: String,
    batch_size: usize,
}

impl std::fmt::Debug for GoogleDocsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDocsPublisher")
            .field("docs_endpoint", &self.docs_endpoint)
            .field("drive_endpoint", &self.drive_endpoint)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl GoogleDocsPublisher {
    /// Authenticate with the service-account key at `credentials_path`.
    pub fn new(client: Client, credentials_path: impl Into<PathBuf>) -> Self {
        Self::with_tokens(client, Arc::new(ServiceAccountTokens::new(credentials_path)))
    }

    pub fn with_tokens(client: Client, tokens: Arc<dyn AccessTokens>) -> Self {
        Self {
            client,
            tokens,
            docs_endpoint: DOCS_ENDPOINT.to_string(),
            drive_endpoint: DRIVE_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the Docs and Drive API roots.
    pub fn with_endpoints(mut self, docs: impl Into<String>, drive: impl Into<String>) -> Self {
        self.docs_endpoint = docs.into().trim_end_matches('/').to_string();
        self.drive_endpoint = drive.into().trim_end_matches('/').to_string();
        self
    }

    /// Characters per insert request. Default: [`DEFAULT_BATCH_SIZE`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// One `insertText` request per chunk at increasing document indices.
    ///
    /// Docs indices count UTF-16 code units and the body starts at index 1.
    fn insert_requests(&self, body: &str) -> Vec<Value> {
        let mut index = 1usize;
        chunk_content(body, self.batch_size)
            .into_iter()
            .map(|chunk| {
                let request = json!({
                    "insertText": {
                        "location": { "index": index },
                        "text": chunk.text,
                    }
                });
                index += chunk.text.encode_utf16().count();
                request
            })
            .collect()
    }

    async fn post(&self, token: &str, url: &str, body: &Value, step: &str) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::PublishFailure(format!("{} failed: {}", step, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::PublishFailure(format!(
                "{} failed with HTTP {}: {}",
                step,
                status.as_u16(),
                text
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| PipelineError::PublishFailure(format!("{}: invalid response: {}", step, e)))
    }
}

#[async_trait]
impl Publisher for GoogleDocsPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ArtifactRef> {
        let token = self.tokens.access_token().await?;
        let token = token.as_str();
        let docs = self.docs_endpoint.as_str();
        let drive = self.drive_endpoint.as_str();

        let created = self
            .post(
                token,
                &format!("{}/v1/documents", docs),
                &json!({ "title": artifact.title }),
                "create document",
            )
            .await?;
        let doc_id = created
            .get("documentId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PipelineError::PublishFailure("create document: response has no documentId".into())
            })?
            .to_string();
        debug!(doc_id = %doc_id, title = %artifact.title, "document created");

        let requests = self.insert_requests(&artifact.body);
        if !requests.is_empty() {
            let batches = requests.len();
            self.post(
                token,
                &format!("{}/v1/documents/{}:batchUpdate", docs, doc_id),
                &json!({ "requests": requests }),
                "insert content",
            )
            .await?;
            debug!(doc_id = %doc_id, batches, "content inserted");
        }

        self.post(
            token,
            &format!("{}/drive/v3/files/{}/permissions?fields=id", drive, doc_id),
            &json!({ "type": "anyone", "role": "reader" }),
            "share document",
        )
        .await?;

        let url = format!("https://docs.google.com/document/d/{}", doc_id);
        info!(url = %url, "document published");
        Ok(ArtifactRef::Remote { url })
    }

    fn name(&self) -> &'static str {
        "google-docs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(server: &MockServer) -> GoogleDocsPublisher {
        GoogleDocsPublisher::with_tokens(Client::new(), Arc::new(StaticToken("ya29.token".into())))
            .with_endpoints(server.uri(), server.uri())
    }

    #[test]
    fn test_insert_requests_use_increasing_indices() {
        let publisher =
            GoogleDocsPublisher::with_tokens(Client::new(), Arc::new(StaticToken("t".into())))
                .with_batch_size(3);

        let requests = publisher.insert_requests("ab😀cdef");
        let indices: Vec<u64> = requests
            .iter()
            .map(|r| r["insertText"]["location"]["index"].as_u64().unwrap())
            .collect();
        // "ab😀" is 4 UTF-16 units, "cde" is 3.
        assert_eq!(indices, vec![1, 5, 8]);
        assert_eq!(requests[2]["insertText"]["text"], "f");
    }

    #[test]
    fn test_debug_hides_token() {
        let token = StaticToken("secret-token".into());
        assert!(!format!("{:?}", token).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_publish_creates_inserts_and_shares() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/documents"))
            .and(header("Authorization", "Bearer ya29.token"))
            .and(body_json(json!({"title": "Website Summary"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"documentId": "doc123"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/documents/doc123:batchUpdate"))
            .and(body_json(json!({"requests": [
                {"insertText": {"location": {"index": 1}, "text": "Short summary."}}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files/doc123/permissions"))
            .and(query_param("fields", "id"))
            .and(body_json(json!({"type": "anyone", "role": "reader"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "perm1"})))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        let artifact = Artifact::new(ArtifactKind::Summary, "Website Summary", "Short summary.");
        let reference = publisher.publish(&artifact).await.unwrap();

        assert_eq!(
            reference,
            ArtifactRef::Remote {
                url: "https://docs.google.com/document/d/doc123".into()
            }
        );
    }

    #[tokio::test]
    async fn test_publish_failure_on_create_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/documents"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        let artifact = Artifact::new(ArtifactKind::Summary, "t", "body");
        let err = publisher.publish(&artifact).await.unwrap_err();

        match err {
            PipelineError::PublishFailure(msg) => assert!(msg.contains("403")),
            other => panic!("expected PublishFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_file_is_publish_failure() {
        let publisher = GoogleDocsPublisher::new(Client::new(), "/nonexistent/creds.json");
        let artifact = Artifact::new(ArtifactKind::Summary, "t", "body");
        let err = publisher.publish(&artifact).await.unwrap_err();
        assert!(matches!(err, PipelineError::PublishFailure(_)));
    }

    #[tokio::test]
    async fn test_service_account_key_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service_account.json");
        std::fs::write(&path, include_str!("testdata/service_account.json")).unwrap();

        let tokens = ServiceAccountTokens::new(&path);
        let account = tokens.account().await;
        assert!(account.is_ok(), "key rejected: {:?}", account.err());
    }

    #[tokio::test]
    async fn test_non_service_account_file_is_publish_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token": "abc"}"#).unwrap();

        let publisher = GoogleDocsPublisher::new(Client::new(), &path);
        let artifact = Artifact::new(ArtifactKind::Summary, "t", "body");
        match publisher.publish(&artifact).await.unwrap_err() {
            PipelineError::PublishFailure(msg) => assert!(msg.contains("service account")),
            other => panic!("expected PublishFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_overrides_trim_slash() {
        let publisher = GoogleDocsPublisher::new(Client::new(), "unused.json")
            .with_endpoints("http://docs.local/", "http://drive.local");
        assert_eq!(publisher.docs_endpoint, "http://docs.local");
        assert_eq!(publisher.drive_endpoint, "http://drive.local");
    }
}
