use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use shared::{
    error::ApiError,
    protocol::{LoginUser, AUTH_HEADER},
};
use tokio::{net::TcpListener, sync::Mutex};
use url::Url;

use crate::reachability::AlwaysReachable;

fn session(user: &str) -> Session {
    Session {
        identity: UserId(user.to_string()),
        token: format!("token-{user}"),
        authenticated_at: Utc::now(),
    }
}

#[derive(Default)]
struct FakeLogin {
    outcomes: Mutex<VecDeque<Result<Session, LoginError>>>,
    calls: AtomicU32,
    logout_calls: AtomicU32,
    fail_logout: bool,
}

impl FakeLogin {
    fn with_outcomes(outcomes: Vec<Result<Session, LoginError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Self::default()
        })
    }
}

#[async_trait]
impl LoginProvider for FakeLogin {
    async fn login(&self) -> Result<Session, LoginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LoginError::InvalidOperation("no scripted outcome".into())))
    }

    async fn logout(&self) -> anyhow::Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout {
            return Err(anyhow!("logout endpoint offline"));
        }
        Ok(())
    }
}

struct Offline;

#[async_trait]
impl ReachabilityProbe for Offline {
    async fn is_reachable(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn second_call_reuses_cached_session() {
    let login = FakeLogin::with_outcomes(vec![Ok(session("alice"))]);
    let mut auth = AuthSession::new(login.clone(), Arc::new(AlwaysReachable));

    let first = auth.ensure_authenticated().await.expect("login");
    let second = auth.ensure_authenticated().await.expect("cached");

    assert_eq!(first, second);
    assert_eq!(login.calls.load(Ordering::SeqCst), 1);
    assert_eq!(auth.login_attempts(), 1);
    assert_eq!(auth.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn unreachable_network_fails_before_login() {
    let login = FakeLogin::with_outcomes(vec![Ok(session("alice"))]);
    let mut auth = AuthSession::new(login.clone(), Arc::new(Offline));

    let err = auth.ensure_authenticated().await.expect_err("offline");

    assert_eq!(err, SyncError::NetworkUnavailable);
    assert_eq!(login.calls.load(Ordering::SeqCst), 0);
    assert_eq!(auth.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn invalid_operation_leaves_session_empty_for_a_later_retry() {
    let login = FakeLogin::with_outcomes(vec![
        Err(LoginError::InvalidOperation("user cancelled".into())),
        Ok(session("alice")),
    ]);
    let mut auth = AuthSession::new(login.clone(), Arc::new(AlwaysReachable));

    let err = auth.ensure_authenticated().await.expect_err("cancelled");
    assert_eq!(err, SyncError::AuthenticationRequired);
    assert!(auth.session().is_none());

    let session = auth.ensure_authenticated().await.expect("retry");
    assert_eq!(session.identity, UserId("alice".into()));
    assert_eq!(login.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreachable_login_service_reports_network_unavailable() {
    let login = FakeLogin::with_outcomes(vec![Err(LoginError::Unreachable(
        "connection refused".into(),
    ))]);
    let mut auth = AuthSession::new(login, Arc::new(AlwaysReachable));

    let err = auth.ensure_authenticated().await.expect_err("unreachable");
    assert_eq!(err, SyncError::NetworkUnavailable);
    assert_eq!(auth.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn logout_clears_session_even_when_remote_notification_fails() {
    let login = Arc::new(FakeLogin {
        outcomes: Mutex::new(vec![Ok(session("alice")), Ok(session("alice"))].into()),
        fail_logout: true,
        ..FakeLogin::default()
    });
    let mut auth = AuthSession::new(login.clone(), Arc::new(AlwaysReachable));

    auth.ensure_authenticated().await.expect("login");
    auth.logout().await;
    assert_eq!(auth.state(), AuthState::Unauthenticated);
    assert_eq!(login.logout_calls.load(Ordering::SeqCst), 1);

    auth.ensure_authenticated().await.expect("login again");
    assert_eq!(login.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn logout_without_session_does_not_contact_service() {
    let login = FakeLogin::with_outcomes(Vec::new());
    let mut auth = AuthSession::new(login.clone(), Arc::new(AlwaysReachable));

    auth.logout().await;
    assert_eq!(login.logout_calls.load(Ordering::SeqCst), 0);
}

#[derive(Clone, Default)]
struct LoginServerState {
    logout_tokens: Arc<Mutex<Vec<Option<String>>>>,
}

async fn handle_login(
    Path(provider): Path<String>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    if provider != "microsoftaccount" || request.username == "mallory" {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::unauthorized("login rejected")),
        ));
    }
    Ok(Json(LoginResponse {
        user: LoginUser {
            user_id: UserId(format!("MicrosoftAccount:{}", request.username)),
        },
        authentication_token: format!("jwt-{}", request.username),
    }))
}

async fn handle_logout(State(state): State<LoginServerState>, headers: HeaderMap) -> StatusCode {
    let token = headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.logout_tokens.lock().await.push(token);
    StatusCode::NO_CONTENT
}

async fn spawn_login_server(state: LoginServerState) -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/login/:provider", post(handle_login))
        .route("/logout", post(handle_logout))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}")).expect("url")
}

struct Cancelled;

#[async_trait]
impl CredentialPrompt for Cancelled {
    async fn username(&self) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn http_login_installs_token_and_logout_removes_it() {
    let state = LoginServerState::default();
    let base = spawn_login_server(state.clone()).await;
    let service = ServiceClient::new(base, None).expect("service");
    let provider = HttpLoginProvider::new(
        Arc::clone(&service),
        "microsoftaccount",
        Arc::new(StaticCredentials("alice".into())),
    );

    let session = provider.login().await.expect("login");
    assert_eq!(
        session.identity,
        UserId("MicrosoftAccount:alice".into())
    );
    assert_eq!(service.auth_token().await.as_deref(), Some("jwt-alice"));

    provider.logout().await.expect("logout");
    assert_eq!(service.auth_token().await, None);
    assert_eq!(
        state.logout_tokens.lock().await.as_slice(),
        &[Some("jwt-alice".to_string())]
    );
}

#[tokio::test]
async fn http_login_rejection_is_an_invalid_operation() {
    let base = spawn_login_server(LoginServerState::default()).await;
    let service = ServiceClient::new(base, None).expect("service");
    let provider = HttpLoginProvider::new(
        Arc::clone(&service),
        "microsoftaccount",
        Arc::new(StaticCredentials("mallory".into())),
    );

    let err = provider.login().await.expect_err("rejected");
    assert!(
        matches!(&err, LoginError::InvalidOperation(message) if message == "login rejected"),
        "{err:?}"
    );
    assert_eq!(service.auth_token().await, None);
}

#[tokio::test]
async fn cancelled_prompt_never_reaches_the_service() {
    let state = LoginServerState::default();
    let base = spawn_login_server(state).await;
    let service = ServiceClient::new(base, None).expect("service");
    let provider = HttpLoginProvider::new(service, "microsoftaccount", Arc::new(Cancelled));

    let err = provider.login().await.expect_err("cancelled");
    assert!(matches!(err, LoginError::InvalidOperation(_)));
}

#[tokio::test]
async fn http_login_against_closed_port_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let service = ServiceClient::new(
        Url::parse(&format!("http://{addr}")).expect("url"),
        None,
    )
    .expect("service");
    let provider = HttpLoginProvider::new(
        service,
        "microsoftaccount",
        Arc::new(StaticCredentials("alice".into())),
    );

    let err = provider.login().await.expect_err("unreachable");
    assert!(matches!(err, LoginError::Unreachable(_)), "{err:?}");
}
