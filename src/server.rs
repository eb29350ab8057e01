//! The HTTP server.
//!
//! # Examples
//!
//! Default greeting.
//!
//! ```rust
//! # use greet_service::feature::greet::greet_api::Message;
//! # tokio_test::block_on(async {
//! # let url = greet_service::server::spawn_app().await;
//! let response = reqwest::get(format!("{}/greet", url)).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!(Message::new("Ciao World!".to_string()), response.json::<Message>().await.unwrap());
//! # });
//! ```
//!
//! Greeting with a name.
//!
//! ```rust
//! # use greet_service::feature::greet::greet_api::Message;
//! # tokio_test::block_on(async {
//! # let url = greet_service::server::spawn_app().await;
//! let response = reqwest::get(format!("{}/greet/Joe", url)).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!(Message::new("Ciao Joe!".to_string()), response.json::<Message>().await.unwrap());
//! # });
//! ```

use crate::{
    feature::{greet::greet_api, health::health_api},
    infra::{
        config::Config,
        error::{InternalError, PanicHandler},
        metrics,
        middleware::{log_request_response, MakeRequestIdSpan},
        openapi::ApiDoc,
        shutdown::shutdown_signal,
        state::AppState,
    },
};
use axum::{error_handling::HandleErrorLayer, response::IntoResponse, Router};
use http::{header::AUTHORIZATION, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use std::iter;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Constructs the full axum application.
pub fn app(state: AppState) -> Router {
    let server = &state.config().server;

    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e| async move {
            InternalError::Other(format!("Tower middleware failed: {e}")).into_response()
        }))
        .concurrency_limit(server.concurrency_limit);

    // Health checks and docs, with static files for everything else.
    let ambient = Router::new()
        .merge(health_api::routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(&server.static_dir))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server.request_timeout,
        ));

    // The greeting routes set up their own timeouts.
    ambient
        .nest_service("/greet", greet_api::routes(state.clone()))
        .with_state(state.clone())
        // Layers
        .layer(axum::middleware::from_fn(log_request_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(iter::once(
            AUTHORIZATION,
        )))
        .layer(tower_middleware)
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Starts the axum server.
pub async fn run_app(
    listener: TcpListener,
    config: Config,
    metrics: PrometheusHandle,
) -> std::io::Result<()> {
    let state = AppState::new(config, metrics);
    let app = app(state).into_make_service();

    tracing::info!("Starting axum on {}", listener.local_addr()?);
    let exit_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match &exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    exit_result
}

/// Spawn a server on a random port.
pub async fn spawn_app() -> String {
    let config = crate::infra::config::load_config().unwrap();
    spawn_app_with_config(config).await
}

/// Spawn a server on a random port with a custom configuration.
pub async fn spawn_app_with_config(config: Config) -> String {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(run_app(listener, config, metrics::detached_handle()));
    format!("http://{address}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::{
            greet::greet_api::{Greeting, Message},
            health::health_api::Health,
        },
        infra::{
            config::{SecurityConfig, ServerConfig, ServiceConfig, TelemetryConfig, UserConfig},
            error::ErrorBody,
        },
    };
    use axum::{body::Body, Router};
    use base64::Engine;
    use http::{Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use std::{
        path::PathBuf,
        time::{Duration, Instant},
    };
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                http_address: "127.0.0.1".to_string(),
                http_port: 0,
                request_timeout: Duration::from_secs(10),
                concurrency_limit: 100,
                static_dir: PathBuf::from("static"),
            },
            service: ServiceConfig {
                greeting: "Ciao".to_string(),
            },
            security: SecurityConfig {
                enabled: true,
                users: vec![UserConfig {
                    username: "admin".to_string(),
                    password_hash: bcrypt::hash("admin", 4).unwrap(),
                }],
            },
            telemetry: TelemetryConfig::default(),
        }
    }

    fn test_state() -> AppState {
        AppState::new(test_config(), metrics::detached_handle())
    }

    fn basic_auth(username: &str, password: &str) -> String {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        format!("Basic {credentials}")
    }

    async fn body_bytes(res: Response<Body>) -> Vec<u8> {
        res.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn json<T: DeserializeOwned>(res: Response<Body>) -> T {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn default_greeting_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/greet")).await;
        assert_eq!(StatusCode::OK, res.status());
        let message: Message = json(res).await;
        assert_eq!(Message::new("Ciao World!".to_string()), message);
    }

    #[tokio::test]
    async fn named_greeting_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/greet/Joe")).await;
        assert_eq!(StatusCode::OK, res.status());
        let message: Message = json(res).await;
        assert_eq!("Ciao Joe!", message.message());
    }

    #[tokio::test]
    async fn name_is_percent_decoded() {
        let app = app(test_state());
        let res = send(&app, get("/greet/Mary%20Jane")).await;
        let message: Message = json(res).await;
        assert_eq!("Ciao Mary Jane!", message.message());
    }

    #[tokio::test]
    async fn current_greeting_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/greet/greeting")).await;
        assert_eq!(StatusCode::OK, res.status());
        let greeting: Greeting = json(res).await;
        assert_eq!("Ciao", greeting.greeting());
    }

    #[tokio::test]
    async fn authenticated_put_changes_greeting() {
        let app = app(test_state());
        let req = Request::put("/greet/greeting/Hola")
            .header("Authorization", basic_auth("admin", "admin"))
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::OK, res.status());
        let greeting: Greeting = json(res).await;
        assert_eq!("Hola", greeting.greeting());

        let res = send(&app, get("/greet/greeting")).await;
        let greeting: Greeting = json(res).await;
        assert_eq!("Hola", greeting.greeting());
    }

    #[tokio::test]
    async fn put_without_credentials_is_unauthorized() {
        let state = test_state();
        let app = app(state.clone());
        let req = Request::put("/greet/greeting/Hola")
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        let body: ErrorBody = json(res).await;
        assert_eq!("unauthorized", body.message());
        assert_eq!("Ciao", state.greetings().greeting());
    }

    #[tokio::test]
    async fn put_with_wrong_password_is_unauthorized() {
        let state = test_state();
        let app = app(state.clone());
        let req = Request::put("/greet/greeting/Hola")
            .header("Authorization", basic_auth("admin", "notadmin"))
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        assert_eq!("Ciao", state.greetings().greeting());
    }

    #[tokio::test]
    async fn put_is_open_when_security_is_disabled() {
        let mut config = test_config();
        config.security.enabled = false;
        let app = app(AppState::new(config, metrics::detached_handle()));
        let req = Request::put("/greet/greeting/Hej")
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::OK, res.status());
        let greeting: Greeting = json(res).await;
        assert_eq!("Hej", greeting.greeting());
    }

    #[tokio::test]
    async fn post_changes_greeting() {
        let app = app(test_state());
        let res = send(&app, post_json("/greet/greeting", r#"{"greeting": "Howdy"}"#)).await;
        assert_eq!(StatusCode::OK, res.status());
        let greeting: Greeting = json(res).await;
        assert_eq!("Howdy", greeting.greeting());

        let res = send(&app, get("/greet")).await;
        let message: Message = json(res).await;
        assert_eq!("Howdy World!", message.message());
    }

    #[tokio::test]
    async fn post_without_greeting_is_bad_request() {
        let state = test_state();
        let app = app(state.clone());
        for body in [r#"{}"#, r#"{"greeting": null}"#] {
            let res = send(&app, post_json("/greet/greeting", body)).await;
            assert_eq!(StatusCode::BAD_REQUEST, res.status());
            assert_eq!(b"No greeting in your JSON dude!".to_vec(), body_bytes(res).await);
        }
        assert_eq!("Ciao", state.greetings().greeting());
    }

    #[tokio::test]
    async fn post_without_json_content_type_is_parsed() {
        let state = test_state();
        let app = app(state.clone());
        let req = Request::post("/greet/greeting")
            .body(Body::from(r#"{"greeting" : "Howdy"}"#))
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!("Howdy", state.greetings().greeting());

        let req = Request::post("/greet/greeting")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from("{}"))
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(StatusCode::BAD_REQUEST, res.status());
        assert_eq!(b"No greeting in your JSON dude!".to_vec(), body_bytes(res).await);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_by_the_extractor() {
        let state = test_state();
        let app = app(state.clone());
        let res = send(&app, post_json("/greet/greeting", "{not json")).await;
        assert!(res.status().is_client_error());
        let _: ErrorBody = json(res).await;
        assert_eq!("Ciao", state.greetings().greeting());
    }

    #[tokio::test]
    async fn every_request_is_counted_once() {
        let state = test_state();
        let app = app(state.clone());
        let before = state.greetings().request_count();

        send(&app, get("/greet")).await;
        send(&app, get("/greet/Joe")).await;
        send(&app, get("/greet/greeting")).await;
        send(&app, post_json("/greet/greeting", "{}")).await;
        send(
            &app,
            Request::put("/greet/greeting/Hola")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        send(&app, post_json("/greet/slowgreeting", "{}")).await;

        let res = send(&app, get("/greet/a/b")).await;
        assert_eq!(StatusCode::NOT_FOUND, res.status());
        let _: ErrorBody = json(res).await;
        send(&app, get("/greet/")).await;

        assert_eq!(before + 8, state.greetings().request_count());
    }

    #[tokio::test]
    async fn ambient_endpoints_are_not_counted() {
        let state = test_state();
        let app = app(state.clone());
        send(&app, get("/health")).await;
        send(&app, get("/ready")).await;
        assert_eq!(0, state.greetings().request_count());
    }

    #[tokio::test]
    async fn health_reports_up() {
        let state = test_state();
        let app = app(state.clone());
        send(&app, get("/greet")).await;
        let res = send(&app, get("/health")).await;
        assert_eq!(StatusCode::OK, res.status());
        let health: Health = json(res).await;
        assert_eq!("UP", health.status);
        assert_eq!(1, health.requests);
    }

    #[tokio::test]
    async fn ready_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/ready")).await;
        assert_eq!(StatusCode::OK, res.status());
        assert_eq!(b"Ready!".to_vec(), body_bytes(res).await);
    }

    #[tokio::test]
    async fn metrics_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/metrics")).await;
        assert_eq!(StatusCode::OK, res.status());
    }

    #[tokio::test]
    async fn swagger_ui_oneshot() {
        let app = app(test_state());
        let res = send(&app, get("/swagger-ui/index.html")).await;
        assert_eq!(StatusCode::OK, res.status());
        let res = send(&app, get("/api-docs/openapi.json")).await;
        assert_eq!(StatusCode::OK, res.status());
    }

    #[tokio::test]
    async fn static_files_are_served_for_other_paths() {
        let app = app(test_state());
        let res = send(&app, get("/")).await;
        assert_eq!(StatusCode::OK, res.status());
        let res = send(&app, get("/no-such-file.txt")).await;
        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let app = app(test_state());
        let res = send(&app, get("/greet")).await;
        assert!(res.headers().contains_key("x-request-id"));

        let req = Request::get("/greet")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!("abc-123", res.headers()["x-request-id"]);
    }

    #[tokio::test]
    async fn slow_greeting_commits_only_after_delay() {
        let url = spawn_app_with_config(test_config()).await;
        let client = reqwest::Client::new();

        let start = Instant::now();
        let slow = tokio::spawn({
            let client = client.clone();
            let url = url.clone();
            async move {
                client
                    .post(format!("{url}/greet/slowgreeting"))
                    .json(&serde_json::json!({"greeting": "Hi", "delay": 1}))
                    .send()
                    .await
                    .unwrap()
            }
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        let during: Greeting = client
            .get(format!("{url}/greet/greeting"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!("Ciao", during.greeting());

        let res = slow.await.unwrap();
        assert_eq!(200, res.status());
        assert!(start.elapsed() >= Duration::from_secs(1));
        let greeting: Greeting = res.json().await.unwrap();
        assert_eq!("Hi", greeting.greeting());

        let after: Greeting = client
            .get(format!("{url}/greet/greeting"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!("Hi", after.greeting());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_greeting_may_outlast_request_timeout() {
        let state = test_state();
        let app = app(state.clone());
        let res = send(
            &app,
            post_json("/greet/slowgreeting", r#"{"greeting": "Hi", "delay": 15}"#),
        )
        .await;
        assert_eq!(StatusCode::OK, res.status());
        let greeting: Greeting = json(res).await;
        assert_eq!("Hi", greeting.greeting());
        assert_eq!("Hi", state.greetings().greeting());
    }

    #[tokio::test]
    async fn slow_greeting_without_greeting_fails_without_waiting() {
        let url = spawn_app_with_config(test_config()).await;
        let client = reqwest::Client::new();

        let start = Instant::now();
        let res = client
            .post(format!("{url}/greet/slowgreeting"))
            .json(&serde_json::json!({"delay": 5}))
            .send()
            .await
            .unwrap();
        assert_eq!(400, res.status());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!("No greeting in your JSON dude!", res.text().await.unwrap());
    }
}
