use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::HeaderName,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use platform_api::{ApiError, ApiResult, EmployeePayload, HealthPayload};
use platform_authn::IdentityGateway;
use platform_authz::AccessPolicy;
use products_directory::{Directory, DirectoryError, normalize_term};
use sea_orm::{ConnectionTrait, Statement};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    gate::{Authorized, LOGIN_PATH, found},
    login::{LoginForm, sign_in},
    session::{Identity, SessionCookies},
    views::{DirectoryView, directory_page, login_page},
};

#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    pub gateway: Arc<dyn IdentityGateway>,
    pub policy: Arc<AccessPolicy>,
    pub cookies: SessionCookies,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(addr = %config.addr, "staff directory listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", get(login_form_handler).post(login_submit_handler))
        .route("/logout", get(logout_handler))
        .route("/", get(index_handler))
        .route("/search", get(search_handler))
        .route("/api/employees", get(list_employees_handler))
        .route("/api/employees/{id}", get(get_employee_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

async fn login_form_handler(identity: Identity) -> Response {
    if identity.authenticated {
        return found("/");
    }
    Html(login_page(None)).into_response()
}

async fn login_submit_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match sign_in(state.gateway.as_ref(), &state.policy, &form).await {
        Ok(identity) => {
            let jar = state
                .cookies
                .establish(jar, &identity.username, &identity.groups);
            (jar, found("/")).into_response()
        }
        Err(err) => Html(login_page(Some(err.user_message()))).into_response(),
    }
}

async fn logout_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    (state.cookies.clear(jar), found(LOGIN_PATH)).into_response()
}

async fn index_handler(
    State(state): State<AppState>,
    Authorized(identity): Authorized,
) -> ApiResult<Html<String>> {
    let employees = state.directory.list_all().await.map_err(directory_error)?;
    Ok(Html(directory_page(&DirectoryView {
        username: &identity.username,
        employees: &employees,
        search: None,
    })))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_handler(
    State(state): State<AppState>,
    Authorized(identity): Authorized,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Html<String>> {
    let term = normalize_term(&query.q);
    let employees = match term {
        Some(term) => state.directory.search(term).await,
        None => state.directory.list_all().await,
    }
    .map_err(directory_error)?;
    Ok(Html(directory_page(&DirectoryView {
        username: &identity.username,
        employees: &employees,
        search: term,
    })))
}

async fn list_employees_handler(
    State(state): State<AppState>,
    _: Authorized,
) -> ApiResult<Json<Vec<EmployeePayload>>> {
    let employees = state.directory.list_all().await.map_err(directory_error)?;
    Ok(Json(employees.into_iter().map(EmployeePayload::from).collect()))
}

async fn get_employee_handler(
    State(state): State<AppState>,
    _: Authorized,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<EmployeePayload>> {
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::InvalidInput("invalid id".into()))?;
    // Numeric but beyond the id column's range: no such row.
    let id = i32::try_from(id).map_err(|_| ApiError::NotFound("employee"))?;
    let employee = state
        .directory
        .get_by_id(id)
        .await
        .map_err(directory_error)?;
    Ok(Json(employee.into()))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.directory.store().pool();
    let db_ok = pool
        .execute(Statement::from_string(
            pool.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();
    Json(HealthPayload {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn directory_error(err: DirectoryError) -> ApiError {
    match err {
        DirectoryError::NotFound(_) => ApiError::NotFound("employee"),
        err @ DirectoryError::StoreUnavailable(_) => ApiError::internal(err),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{login::tests::FakeGateway, session::SESSION_TTL};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use axum_extra::extract::cookie::Cookie;
    use http_body_util::BodyExt;
    use platform_db::{EmployeeStore, TableName};
    use sea_orm::Database;
    use serde_json::Value;
    use tower::ServiceExt;

    const ADMIN_COOKIES: &str = r#"username=ivanov; usergroups=["sys.admins"]"#;

    async fn app_with(gateway: FakeGateway) -> Router {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        let store = EmployeeStore::new(pool, TableName::default());
        store.ensure_table().await.unwrap();
        store.seed_samples().await.unwrap();
        build_router(AppState {
            directory: Directory::new(store),
            gateway: Arc::new(gateway),
            policy: Arc::new(AccessPolicy::default()),
            cookies: SessionCookies::default(),
        })
    }

    async fn app() -> Router {
        app_with(FakeGateway::accepting(&["sys.admins"])).await
    }

    fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn login(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn set_cookies(response: &Response) -> Vec<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| Cookie::parse_encoded(v.to_str().unwrap().to_string()).unwrap())
            .collect()
    }

    /// Turns `Set-Cookie` headers into the `Cookie` header a browser would send.
    fn cookie_header(response: &Response) -> String {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[tokio::test]
    async fn protected_routes_redirect_without_a_session() {
        let app = app().await;
        for uri in ["/", "/search?q=ivan", "/api/employees", "/api/employees/1"] {
            let response = app.clone().oneshot(get(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
            assert_eq!(location(&response), "/login", "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_sessions_redirect() {
        let app = app().await;
        for cookies in [
            "username=ivanov; usergroups=not-json",
            "username=ivanov",
            r#"usergroups=["sys.admins"]"#,
            r#"username=; usergroups=["sys.admins"]"#,
        ] {
            let response = app
                .clone()
                .oneshot(get("/api/employees", Some(cookies)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FOUND, "{cookies}");
            assert_eq!(location(&response), "/login");
        }
    }

    #[tokio::test]
    async fn groups_are_not_rechecked_after_sign_in() {
        let app = app().await;
        for cookies in [
            r#"username=ivanov; usergroups=["Guests"]"#,
            "username=ivanov; usergroups=[]",
        ] {
            let response = app
                .clone()
                .oneshot(get("/api/employees", Some(cookies)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{cookies}");
        }
    }

    #[tokio::test]
    async fn store_failures_are_masked_as_internal_errors() {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        // table never created
        let app = build_router(AppState {
            directory: Directory::new(EmployeeStore::new(pool, TableName::default())),
            gateway: Arc::new(FakeGateway::accepting(&["sys.admins"])),
            policy: Arc::new(AccessPolicy::default()),
            cookies: SessionCookies::default(),
        });
        for uri in ["/api/employees", "/api/employees/1"] {
            let response = app
                .clone()
                .oneshot(get(uri, Some(ADMIN_COOKIES)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(
                body_json(response).await,
                serde_json::json!({"error": "internal server error"})
            );
        }
        let page = app.oneshot(get("/", Some(ADMIN_COOKIES))).await.unwrap();
        assert_eq!(page.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn api_lists_employees_in_name_order() {
        let response = app()
            .await
            .oneshot(get("/api/employees", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let last_names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["last_name"].as_str().unwrap())
            .collect();
        assert_eq!(last_names, vec!["Ivanov", "Kozlova", "Petrova", "Sidorov"]);
    }

    #[tokio::test]
    async fn api_fetches_single_employee_or_reports_why_not() {
        let app = app().await;
        let list = body_json(
            app.clone()
                .oneshot(get("/api/employees", Some(ADMIN_COOKIES)))
                .await
                .unwrap(),
        )
        .await;
        let id = list[0]["id"].as_i64().unwrap();

        let found = app
            .clone()
            .oneshot(get(&format!("/api/employees/{id}"), Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        let body = body_json(found).await;
        assert_eq!(body["last_name"], "Ivanov");
        assert_eq!(body["building"], "HQ-A");
        assert_eq!(body["status"], "active");

        let missing = app
            .clone()
            .oneshot(get("/api/employees/9999", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["error"], "employee not found");

        let invalid = app
            .oneshot(get("/api/employees/abc", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(invalid).await["error"], "invalid id");
    }

    #[tokio::test]
    async fn out_of_range_ids_are_not_found() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(get("/api/employees/99999999999", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "employee not found");

        let response = app
            .oneshot(get("/api/employees/-1", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_and_search_render_the_table() {
        let app = app().await;
        let index = body_text(
            app.clone()
                .oneshot(get("/", Some(ADMIN_COOKIES)))
                .await
                .unwrap(),
        )
        .await;
        assert!(index.contains("ivanov"));
        assert!(index.contains("Total: 4 &middot; Active: 3"));

        let search = body_text(
            app.clone()
                .oneshot(get("/search?q=ANO", Some(ADMIN_COOKIES)))
                .await
                .unwrap(),
        )
        .await;
        assert!(search.contains("Ivanov Ivan Ivanovich"));
        assert!(!search.contains("Petrova"));
        assert!(search.contains("value=\"ANO\""));

        let blank = body_text(
            app.oneshot(get("/search?q=+++", Some(ADMIN_COOKIES)))
                .await
                .unwrap(),
        )
        .await;
        assert!(blank.contains("Total: 4 &middot; Active: 3"));
    }

    #[tokio::test]
    async fn login_form_is_skipped_when_already_signed_in() {
        let app = app().await;
        let anonymous = app.clone().oneshot(get("/login", None)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::OK);
        assert!(body_text(anonymous).await.contains("<form method=\"post\""));

        let signed_in = app
            .clone()
            .oneshot(get("/login", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(signed_in.status(), StatusCode::FOUND);
        assert_eq!(location(&signed_in), "/");

        let malformed = app
            .oneshot(get("/login", Some("username=guest; usergroups=Guests")))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn successful_login_sets_cookies_that_open_the_api() {
        let app = app_with(FakeGateway::accepting(&["Domain Admins", "Users"])).await;
        let response = app
            .clone()
            .oneshot(login("username=petrova&password=s3cret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        for cookie in &cookies {
            assert_eq!(cookie.max_age(), Some(SESSION_TTL));
            assert_eq!(cookie.path(), Some("/"));
            assert_eq!(cookie.http_only(), Some(true));
        }
        let groups = cookies
            .iter()
            .find(|c| c.name() == "usergroups")
            .expect("groups cookie");
        assert_eq!(groups.value(), r#"["Domain Admins","Users"]"#);

        let api = app
            .oneshot(get("/api/employees", Some(&cookie_header(&response))))
            .await
            .unwrap();
        assert_eq!(api.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_logins_render_one_of_three_messages() {
        let missing = app()
            .await
            .oneshot(login("username=petrova"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::OK);
        assert!(missing.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(missing).await.contains("Enter your username and password."));

        let down = app_with(FakeGateway::down())
            .await
            .oneshot(login("username=petrova&password=x"))
            .await
            .unwrap();
        let rejected = app_with(FakeGateway::rejecting())
            .await
            .oneshot(login("username=petrova&password=x"))
            .await
            .unwrap();
        let down_text = body_text(down).await;
        assert!(down_text.contains("Sign-in failed."));
        assert_eq!(down_text, body_text(rejected).await);

        let denied = app_with(FakeGateway::accepting(&["Guests"]))
            .await
            .oneshot(login("username=petrova&password=x"))
            .await
            .unwrap();
        assert!(denied.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(denied).await.contains("Contact your administrator."));
    }

    #[tokio::test]
    async fn logout_expires_the_session() {
        let response = app()
            .await
            .oneshot(get("/logout", Some(ADMIN_COOKIES)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login");
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        }
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let response = app().await.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["db_ok"], true);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = app().await.oneshot(get("/health", None)).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
