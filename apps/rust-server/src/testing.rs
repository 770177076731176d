// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: signing keys, token minting, scripted
//! key sources, an AWS JSON-protocol fake and in-memory upstreams.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_config::{retry::RetryConfig, BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::config::Credentials;
use axum::{
    body::{to_bytes, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{encode, jwk::JwkSet, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use url::Url;

use crate::auth::jwks::{JwksManager, KeySetSource};
use crate::auth::{AuthError, ClaimsVerifier};
use crate::config::Config;
use crate::models::{Item, ItemFields, TokenSet, UserProfile};
use crate::providers::cognito::{NewUser, UserAttribute};
use crate::providers::{IdentityProvider, ItemStore, UpstreamError};
use crate::state::AppState;

pub const TEST_ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TEST";
pub const TEST_AUDIENCE: &str = "test-client-id";
pub const TEST_KID: &str = "test-key-1";

pub const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &str = include_str!("../tests/fixtures/rogue_key.pem");
pub const JWKS_JSON: &str = include_str!("../tests/fixtures/jwks.json");
pub const ROTATED_JWKS_JSON: &str = include_str!("../tests/fixtures/rotated_jwks.json");

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Claims of a valid Cognito ID token for `testuser`.
pub fn id_token_claims() -> Value {
    json!({
        "sub": "user-sub-123",
        "cognito:username": "testuser",
        "email": "test@example.com",
        "aud": TEST_AUDIENCE,
        "iss": TEST_ISSUER,
        "token_use": "id",
        "iat": now(),
        "exp": now() + 3600,
    })
}

pub fn mint_token(claims: Value) -> String {
    mint_token_with(SIGNING_KEY_PEM, Some(TEST_KID), claims)
}

pub fn mint_token_with(pem: &str, kid: Option<&str>, claims: Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("valid RSA key");
    encode(&header, &claims, &key).expect("token encodes")
}

/// A symmetric token carrying a known kid.
pub fn hs256_token(claims: Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(b"shared-secret")).expect("token encodes")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Key source that serves a fixed script of responses.
///
/// `None` entries fail. The last entry repeats once the script runs out.
pub struct ScriptedKeySource {
    script: Vec<Option<&'static str>>,
    fetches: AtomicUsize,
}

impl ScriptedKeySource {
    pub fn new(script: Vec<Option<&'static str>>) -> Self {
        Self {
            script,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for ScriptedKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .script
            .get(n)
            .or(self.script.last())
            .copied()
            .flatten();
        match entry {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| AuthError::KeyResolutionFailed(e.to_string())),
            None => Err(AuthError::KeyResolutionFailed("scripted failure".into())),
        }
    }
}

pub fn static_verifier() -> (ClaimsVerifier, Arc<ScriptedKeySource>) {
    let source = Arc::new(ScriptedKeySource::new(vec![Some(JWKS_JSON)]));
    let verifier = ClaimsVerifier::new(JwksManager::new(source.clone()), TEST_ISSUER, TEST_AUDIENCE);
    (verifier, source)
}

// =============================================================================
// AWS JSON protocol fake
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeReply {
    status: StatusCode,
    body: Value,
}

impl FakeReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn error(status: StatusCode, error_type: &str, message: &str) -> Self {
        Self {
            status,
            body: json!({
                "__type": format!("com.amazonaws.test#{error_type}"),
                "message": message,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub target: String,
    pub content_type: String,
    pub authorization: String,
    pub body: Value,
}

struct FakeState {
    replies: Vec<FakeReply>,
    served: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

pub struct FakeAws {
    pub url: Url,
    state: Arc<FakeState>,
}

impl FakeAws {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }
}

async fn fake_handler(State(state): State<Arc<FakeState>>, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    state.calls.lock().unwrap().push(RecordedCall {
        target: header("x-amz-target"),
        content_type: header("content-type"),
        authorization: header("authorization"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let n = state.served.fetch_add(1, Ordering::SeqCst);
    let reply = state
        .replies
        .get(n)
        .or(state.replies.last())
        .cloned()
        .unwrap_or_else(|| FakeReply::ok(json!({})));
    (
        reply.status,
        [("content-type", "application/x-amz-json-1.1")],
        reply.body.to_string(),
    )
        .into_response()
}

/// SDK configuration with fixed credentials and no retries, so each
/// client call maps to exactly one request against a fake.
pub async fn test_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
        .retry_config(RetryConfig::disabled())
        .load()
        .await
}

/// Serve `replies` in order on an ephemeral port.
pub async fn spawn_aws_fake(replies: Vec<FakeReply>) -> FakeAws {
    let state = Arc::new(FakeState {
        replies,
        served: AtomicUsize::new(0),
        calls: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .fallback(fake_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeAws {
        url: Url::parse(&format!("http://{addr}/")).unwrap(),
        state,
    }
}

// =============================================================================
// In-memory upstreams
// =============================================================================

pub fn sample_item(id: &str, category: &str) -> Item {
    let at: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
    Item {
        id: id.to_string(),
        name: format!("Item {id}"),
        description: "A sample item".to_string(),
        category: category.to_string(),
        price: 19.99,
        created_by: "user-sub-123".to_string(),
        created_at: at,
        updated_at: at,
    }
}

fn mock_tokens() -> TokenSet {
    TokenSet {
        id_token: "mock-id-token".to_string(),
        access_token: "mock-access-token".to_string(),
        refresh_token: Some("mock-refresh-token".to_string()),
        expires_in: 3600,
    }
}

/// Identity provider that records every call and answers with canned data.
#[derive(Default)]
pub struct RecordingIdentity {
    calls: Mutex<Vec<String>>,
    access_tokens: Mutex<Vec<String>>,
    attributes: Mutex<Vec<UserAttribute>>,
    failure: Mutex<Option<UpstreamError>>,
}

impl RecordingIdentity {
    pub fn fail_with(&self, err: UpstreamError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn access_tokens(&self) -> Vec<String> {
        self.access_tokens.lock().unwrap().clone()
    }

    pub fn updated_attributes(&self) -> Vec<UserAttribute> {
        self.attributes.lock().unwrap().clone()
    }

    fn record(&self, op: &str) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_with_token(&self, op: &str, access_token: &str) -> Result<(), UpstreamError> {
        self.access_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
        self.record(op)
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn sign_up(&self, _user: NewUser) -> Result<String, UpstreamError> {
        self.record("sign_up")?;
        Ok("mock-user-sub".to_string())
    }

    async fn confirm_sign_up(&self, _username: &str, _code: &str) -> Result<(), UpstreamError> {
        self.record("confirm_sign_up")
    }

    async fn initiate_auth(&self, _username: &str, _password: &str) -> Result<TokenSet, UpstreamError> {
        self.record("initiate_auth")?;
        Ok(mock_tokens())
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _username: Option<&str>,
    ) -> Result<TokenSet, UpstreamError> {
        self.record("refresh")?;
        Ok(TokenSet {
            refresh_token: None,
            ..mock_tokens()
        })
    }

    async fn forgot_password(&self, _username: &str) -> Result<(), UpstreamError> {
        self.record("forgot_password")
    }

    async fn confirm_forgot_password(
        &self,
        _username: &str,
        _code: &str,
        _new_password: &str,
    ) -> Result<(), UpstreamError> {
        self.record("confirm_forgot_password")
    }

    async fn change_password(
        &self,
        access_token: &str,
        _old_password: &str,
        _new_password: &str,
    ) -> Result<(), UpstreamError> {
        self.record_with_token("change_password", access_token)
    }

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, UpstreamError> {
        self.record_with_token("get_user", access_token)?;
        Ok(UserProfile {
            username: "testuser".to_string(),
            attributes: BTreeMap::from([
                ("email".to_string(), "test@example.com".to_string()),
                ("name".to_string(), "Test User".to_string()),
                ("sub".to_string(), "user-sub-123".to_string()),
            ]),
        })
    }

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: Vec<UserAttribute>,
    ) -> Result<(), UpstreamError> {
        self.record_with_token("update_user_attributes", access_token)?;
        *self.attributes.lock().unwrap() = attributes;
        Ok(())
    }

    async fn global_sign_out(&self, access_token: &str) -> Result<(), UpstreamError> {
        self.record_with_token("global_sign_out", access_token)
    }
}

/// Item store backed by a map, recording every call.
#[derive(Default)]
pub struct RecordingStore {
    items: Mutex<BTreeMap<String, Item>>,
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<UpstreamError>>,
}

impl RecordingStore {
    pub fn insert(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<Item> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub fn fail_with(&self, err: UpstreamError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ItemStore for RecordingStore {
    async fn get_item(&self, id: &str) -> Result<Option<Item>, UpstreamError> {
        self.record("get_item")?;
        Ok(self.get(id))
    }

    async fn list_items(&self, category: Option<&str>) -> Result<Vec<Item>, UpstreamError> {
        self.record("list_items")?;
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| category.is_none_or(|c| item.category == c))
            .cloned()
            .collect())
    }

    async fn create_item(&self, item: Item) -> Result<Item, UpstreamError> {
        self.record("create_item")?;
        let mut items = self.items.lock().unwrap();
        if items.contains_key(&item.id) {
            return Err(UpstreamError::AlreadyExists("Item already exists".into()));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        id: &str,
        fields: ItemFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Item, UpstreamError> {
        self.record("update_item")?;
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(id)
            .ok_or_else(|| UpstreamError::NotFound("Item not found".into()))?;
        item.name = fields.name;
        item.description = fields.description;
        item.category = fields.category;
        item.price = fields.price;
        item.updated_at = updated_at;
        Ok(item.clone())
    }

    async fn delete_item(&self, id: &str) -> Result<(), UpstreamError> {
        self.record("delete_item")?;
        self.items
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| UpstreamError::NotFound("Item not found".into()))
    }
}

// =============================================================================
// Application state
// =============================================================================

pub fn test_vars() -> HashMap<String, String> {
    [
        ("AWS_REGION", "us-east-1"),
        ("COGNITO_USER_POOL_ID", "us-east-1_TEST"),
        ("COGNITO_CLIENT_ID", TEST_AUDIENCE),
        ("ITEMS_TABLE_NAME", "items"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn test_config() -> Config {
    Config::from_map(&test_vars()).expect("test config loads")
}

/// State wired to scripted keys and recording upstreams, with handles
/// kept so tests can inspect what happened.
pub struct TestFixture {
    pub state: AppState,
    pub keys: Arc<ScriptedKeySource>,
    pub identity: Arc<RecordingIdentity>,
    pub items: Arc<RecordingStore>,
}

pub fn test_state() -> TestFixture {
    test_state_with(test_config())
}

pub fn test_state_with(config: Config) -> TestFixture {
    let keys = Arc::new(ScriptedKeySource::new(vec![Some(JWKS_JSON)]));
    let verifier = ClaimsVerifier::new(
        JwksManager::new(keys.clone()),
        config.identity.issuer.clone(),
        config.identity.client_id.clone(),
    );
    let identity = Arc::new(RecordingIdentity::default());
    let items = Arc::new(RecordingStore::default());
    let state = AppState::new(&config, verifier, identity.clone(), items.clone());
    TestFixture {
        state,
        keys,
        identity,
        items,
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
