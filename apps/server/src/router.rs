use crate::error::{ApiError, ApiErrorExt};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, MatchedPath, Path, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::fmt::Write as _;
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, debug_span};
use vain_registry::{Package, PackagePath, Registry, Token, Vcs, parse_namespace};

const API_PREFIX: &str = "/api/v0";

#[derive(Debug, Deserialize)]
struct PublishRequest {
    #[serde(default)]
    vcs: Option<String>,
    #[serde(default)]
    repo: String,
}

#[derive(Debug, Deserialize)]
struct EmailForm {
    email: String,
}

/// Builds the complete route table around `state`.
pub fn init(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(root_mutation).delete(root_mutation))
        .route(&format!("{API_PREFIX}/db"), get(list))
        .route(&format!("{API_PREFIX}/db/"), get(list))
        .route(&format!("{API_PREFIX}/register/"), post(register))
        .route(&format!("{API_PREFIX}/forgot/"), post(forgot))
        .route(&format!("{API_PREFIX}/confirm"), get(confirm_missing))
        .route(&format!("{API_PREFIX}/confirm/"), get(confirm_missing))
        .route(&format!("{API_PREFIX}/confirm/{{token}}"), get(confirm))
        .route(&format!("{API_PREFIX}/confirm/{{token}}/"), get(confirm))
        .route("/{*route}", get(lookup).post(publish).delete(unpublish))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Names the request by its route template; raw URIs carry confirmation tokens.
fn request_span(req: &Request<Body>) -> Span {
    let route = req.extensions().get::<MatchedPath>().map_or("<unmatched>", MatchedPath::as_str);
    debug_span!("request", method = %req.method(), route = %route, version = ?req.version())
}

/// Runs a blocking call on the blocking pool.
async fn offload<T, E, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ApiError::from(format!("blocking task failed: {e}")))?
        .map_err(Into::into)
}

fn render(packages: &[Package]) -> Html<String> {
    let mut page = String::from("<!DOCTYPE html>\n<html><head>\n");
    for pkg in packages {
        let _ = writeln!(page, "{pkg}");
    }
    page.push_str("</head>\n<body><p>go tool metadata in head</p></body>\n</html>\n");
    Html(page)
}

fn host(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(host) = &state.host {
        return Ok(host.clone());
    }
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::bad_request("missing Host header"))
}

fn bearer(headers: &HeaderMap) -> Result<Token, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Token::from)
        .ok_or(ApiError::MissingToken { context: None })
}

async fn index(State(registry): State<Registry>) -> Result<Html<String>, ApiError> {
    let packages = offload(move || Ok::<_, ApiError>(registry.list_packages())).await?;
    Ok(render(&packages))
}

#[allow(clippy::unused_async)]
async fn root_mutation(headers: HeaderMap) -> Result<(), ApiError> {
    bearer(&headers)?;
    Err(ApiError::bad_request("invalid path \"/\""))
}

async fn lookup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(route): Path<String>,
) -> Result<Html<String>, ApiError> {
    let path = PackagePath::hosted(&host(&state, &headers)?, &route)?;
    let registry = state.registry.clone();
    let pkg = offload(move || registry.get_package(&path)).await?;
    Ok(render(std::slice::from_ref(&pkg)))
}

async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(route): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = bearer(&headers)?;
    parse_namespace(&route).context("could not parse namespace")?;

    let req: PublishRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("unable to parse json from body: {e}")))?;
    let vcs = match req.vcs.as_deref().map(str::trim) {
        None | Some("") => Vcs::default(),
        Some(label) => label.parse::<Vcs>()?,
    };
    let pkg = Package::hosted(vcs, req.repo, &host(&state, &headers)?, &route)?;

    let registry = state.registry.clone();
    offload(move || registry.publish(&token, pkg)).await?;
    Ok(StatusCode::OK)
}

async fn unpublish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(route): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = bearer(&headers)?;
    let path = PackagePath::hosted(&host(&state, &headers)?, &route)?;

    let registry = state.registry.clone();
    let removed = offload(move || registry.unpublish(&token, &path)).await?;
    debug!(path = %removed.path(), "Package unpublished over http");
    Ok(StatusCode::OK)
}

async fn list(State(registry): State<Registry>) -> Result<impl IntoResponse, ApiError> {
    let packages = offload(move || Ok::<_, ApiError>(registry.list_packages())).await?;
    Ok(Json(packages))
}

fn email_field(form: Result<Form<EmailForm>, FormRejection>) -> Result<String, ApiError> {
    form.map(|Form(f)| f.email)
        .map_err(|_| ApiError::bad_request("must provide one email parameter"))
}

/// Mails the confirmation link for `token` to `to`.
async fn deliver(
    state: &AppState,
    headers: &HeaderMap,
    to: String,
    token: &Token,
) -> Result<(), ApiError> {
    let link = format!("{}://{}{API_PREFIX}/confirm/{token}", state.scheme, host(state, headers)?);
    let mailer = state.mailer.clone();
    offload(move || mailer.send(&to, "vain confirmation", &link)).await
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<EmailForm>, FormRejection>,
) -> Result<&'static str, ApiError> {
    let email = email_field(form)?;
    let registry = state.registry.clone();
    let address = email.clone();
    let token = offload(move || registry.register_user(&address)).await?;
    deliver(&state, &headers, email, &token).await?;
    Ok("please check your email\n")
}

async fn forgot(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<EmailForm>, FormRejection>,
) -> Result<&'static str, ApiError> {
    let email = email_field(form)?;
    let registry = state.registry.clone();
    let window = state.reset_window;
    let address = email.clone();
    let token = offload(move || registry.request_token_reset(&address, window)).await?;
    deliver(&state, &headers, email, &token).await?;
    Ok("please check your email\n")
}

#[allow(clippy::unused_async)]
async fn confirm_missing() -> ApiError {
    ApiError::bad_request("must provide a token")
}

async fn confirm(
    State(registry): State<Registry>,
    Path(token): Path<String>,
) -> Result<String, ApiError> {
    let token = token.trim_end_matches('/');
    if token.is_empty() {
        return Err(ApiError::bad_request("must provide a token"));
    }
    let token = Token::from(token);
    let fresh = offload(move || registry.confirm_token(&token)).await?;
    Ok(format!("new token: {fresh}\n"))
}
