use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::{AuthError, SessionStore, SessionUser, UserStore};
use crate::core::{Constants, profile_from_form, run_funding_model};
use crate::leads::{LeadStore, LeadStoreError};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");
const LOGIN_HTML: &str = include_str!("../../web/login.html");
const ADMIN_HTML: &str = include_str!("../../web/admin.html");
const ADMIN_JS: &str = include_str!("../../web/admin.js");

const SESSION_COOKIE: &str = "vorsorge_session";
const SESSION_COOKIE_MAX_AGE: u32 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    constants: Constants,
    leads: Arc<LeadStore>,
    users: Arc<UserStore>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    async fn new(config: &ServerConfig) -> Result<Self, ServeError> {
        let leads = LeadStore::new(config.data_dir.join("leads.json"));
        leads.init().await?;
        let users = UserStore::new(config.data_dir.join("users.json"));
        users.init().await?;

        Ok(Self {
            constants: Constants::year_2025(),
            leads: Arc::new(leads),
            users: Arc::new(users),
            sessions: Arc::new(SessionStore::new()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Leads(#[from] LeadStoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginPayload {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

pub async fn run_http_server(config: ServerConfig) -> Result<(), ServeError> {
    let state = AppState::new(&config).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on http://{addr}");
    info!("wizard at http://127.0.0.1:{}/", config.port);
    info!("admin sign-in at http://127.0.0.1:{}/login", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/login", get(login_page_handler))
        .route("/admin", get(admin_page_handler))
        .route("/admin.js", get(admin_js_handler))
        .route(
            "/api/foerderung",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/auth/status", get(auth_status_handler))
        .route(
            "/api/leads",
            post(submit_lead_handler).get(list_leads_handler),
        )
        .route(
            "/api/leads/:key",
            get(leads_by_flow_handler)
                .put(update_lead_handler)
                .delete(delete_lead_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn admin_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        ADMIN_JS,
    ))
}

async fn login_page_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/admin").into_response();
    }
    with_cache_control(Html(LOGIN_HTML))
}

async fn admin_page_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if current_user(&state, &headers).await.is_none() {
        return Redirect::to("/login").into_response();
    }
    with_cache_control(Html(ADMIN_HTML))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut form = Map::new();
    for (key, value) in params {
        form.insert(key, Value::String(value));
    }
    calculate_impl(&state, &form)
}

async fn calculate_post_handler(
    State(state): State<AppState>,
    Json(form): Json<Map<String, Value>>,
) -> Response {
    calculate_impl(&state, &form)
}

fn calculate_impl(state: &AppState, form: &Map<String, Value>) -> Response {
    let profile = profile_from_form(form);
    let result = run_funding_model(&profile, &state.constants);
    json_response(StatusCode::OK, result)
}

async fn submit_lead_handler(
    State(state): State<AppState>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    match state.leads.submit(fields).await {
        Ok(lead) => json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "message": "Lead saved successfully",
                "leadId": lead.id,
            }),
        ),
        Err(err) => lead_error_response(err),
    }
}

async fn list_leads_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let _user = match require_auth(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.leads.list().await {
        Ok(leads) => json_response(
            StatusCode::OK,
            json!({ "success": true, "count": leads.len(), "leads": leads }),
        ),
        Err(err) => lead_error_response(err),
    }
}

async fn leads_by_flow_handler(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    headers: HeaderMap,
) -> Response {
    let _user = match require_auth(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.leads.list_by_flow(&flow).await {
        Ok(leads) => json_response(
            StatusCode::OK,
            json!({ "success": true, "count": leads.len(), "leads": leads }),
        ),
        Err(err) => lead_error_response(err),
    }
}

async fn update_lead_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<Map<String, Value>>,
) -> Response {
    let user = match require_auth(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.leads.update(&id, patch, &user.username).await {
        Ok(lead) => json_response(StatusCode::OK, json!({ "success": true, "lead": lead })),
        Err(err) => lead_error_response(err),
    }
}

async fn delete_lead_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let _user = match require_auth(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.leads.delete(&id).await {
        Ok(()) => json_response(
            StatusCode::OK,
            json!({ "success": true, "message": "Lead gelöscht" }),
        ),
        Err(err) => lead_error_response(err),
    }
}

async fn login_handler(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    let (username, password) = match (payload.username, payload.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Benutzername und Passwort erforderlich",
            );
        }
    };

    match state.users.verify(&username, &password).await {
        Ok(Some(user)) => {
            info!(username = %user.username, "admin login");
            let token = state.sessions.create(user).await;
            let mut response = json_response(
                StatusCode::OK,
                json!({ "success": true, "message": "Login erfolgreich" }),
            );
            response.headers_mut().insert(
                header::SET_COOKIE,
                session_cookie(&token, SESSION_COOKIE_MAX_AGE)
                    .parse()
                    .expect("valid header"),
            );
            response
        }
        Ok(None) => {
            warn!(username = %username, "rejected login attempt");
            error_response(
                StatusCode::UNAUTHORIZED,
                "Ungültiger Benutzername oder Passwort",
            )
        }
        Err(err) => {
            warn!(error = %err, "login failed against the user store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Serverfehler")
        }
    }
}

async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.destroy(&token).await;
    }

    let mut response = json_response(
        StatusCode::OK,
        json!({ "success": true, "message": "Logout erfolgreich" }),
    );
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie("", 0).parse().expect("valid header"),
    );
    response
}

async fn auth_status_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_user(&state, &headers).await {
        Some(user) => json_response(StatusCode::OK, json!({ "success": true, "user": user })),
        None => json_response(
            StatusCode::OK,
            json!({ "success": false, "user": Value::Null }),
        ),
    }
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let token = session_token(headers)?;
    state.sessions.get(&token).await
}

async fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, Response> {
    current_user(state, headers)
        .await
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Nicht authentifiziert"))
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn session_cookie(token: &str, max_age: u32) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn lead_error_response(err: LeadStoreError) -> Response {
    match err {
        LeadStoreError::MissingField(field) => error_response(
            StatusCode::BAD_REQUEST,
            &format!("Missing required field: {field}"),
        ),
        LeadStoreError::NotFound => error_response(StatusCode::NOT_FOUND, "Lead nicht gefunden"),
        LeadStoreError::Io(err) => {
            warn!(error = %err, "lead store io failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Fehler beim Speichern")
        }
        LeadStoreError::Serde(err) => {
            warn!(error = %err, "lead store serialization failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Fehler beim Speichern")
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            success: false,
            error: msg.to_string(),
        },
    )
}
