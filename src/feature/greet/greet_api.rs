//! The greeting API. Greets people and lets clients change the greeting.

use crate::{
    feature::greet::greet_service::{GreetingService, GreetingUpdate, SlowGreetingUpdate},
    infra::{
        error::{ApiResult, ClientError},
        extract::Json,
        middleware::count_requests,
        security::require_user,
        state::AppState,
    },
};
use axum::{extract::State, middleware::from_fn_with_state, Router};
use axum_extra::routing::{RouterExt, TypedPath};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tracing::instrument;
use utoipa::ToSchema;

/// The greeting API endpoints, to be nested under `/greet`.
///
/// Every request under the prefix is counted before anything else, including
/// those no route matches. Updating the greeting through the path requires an
/// authenticated user. All routes but the slow update answer `408` once the
/// configured request timeout has passed.
pub fn routes(state: AppState) -> Router {
    let timeout = state.config().server.request_timeout;

    let secured = Router::new()
        .typed_put(update_greeting)
        .route_layer(from_fn_with_state(state.clone(), require_user));

    Router::new()
        .typed_get(default_message)
        .typed_get(get_greeting)
        .typed_get(named_message)
        .typed_post(update_greeting_from_json)
        .merge(secured)
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        // Waits as long as the client asked for.
        .typed_post(update_greeting_slowly)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/", rejection(ClientError))]
struct Greet;

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/:name", rejection(ClientError))]
struct GreetName {
    name: String,
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/greeting", rejection(ClientError))]
struct CurrentGreeting;

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/greeting/:greeting", rejection(ClientError))]
struct NewGreeting {
    greeting: String,
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/slowgreeting", rejection(ClientError))]
struct SlowGreeting;

async fn not_found() -> ClientError {
    ClientError::Custom(StatusCode::NOT_FOUND, "not found".to_string())
}

/// A greeting addressed to someone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// The greeting followed by a name.
    message: String,
}

impl Message {
    /// Constructs a new message.
    pub fn new(message: String) -> Self {
        Self { message }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }
}

/// The greeting currently in use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Greeting {
    /// The greeting.
    greeting: String,
}

impl Greeting {
    /// Constructs a new greeting.
    pub fn new(greeting: String) -> Self {
        Self { greeting }
    }

    /// Returns the greeting.
    pub fn greeting(&self) -> &str {
        self.greeting.as_ref()
    }
}

/// Greets the world.
#[utoipa::path(
    get,
    path = "/greet",
    responses(
        (status = 200, description = "Success", body = Message),
    )
)]
#[instrument(skip_all)]
async fn default_message(_: Greet, State(service): State<GreetingService>) -> Json<Message> {
    Json(Message::new(service.default_message()))
}

/// Greets someone by name.
#[utoipa::path(
    get,
    path = "/greet/{name}",
    params(("name" = String, Path, description = "Who to greet")),
    responses(
        (status = 200, description = "Success", body = Message),
    )
)]
#[instrument(skip(service))]
async fn named_message(
    GreetName { name }: GreetName,
    State(service): State<GreetingService>,
) -> Json<Message> {
    Json(Message::new(service.message(&name)))
}

/// Returns the greeting in use.
#[utoipa::path(
    get,
    path = "/greet/greeting",
    responses(
        (status = 200, description = "Success", body = Greeting),
    )
)]
#[instrument(skip_all)]
async fn get_greeting(
    _: CurrentGreeting,
    State(service): State<GreetingService>,
) -> Json<Greeting> {
    Json(Greeting::new(service.greeting()))
}

/// Sets the greeting from the path.
#[utoipa::path(
    put,
    path = "/greet/greeting/{greeting}",
    params(("greeting" = String, Path, description = "The new greeting")),
    responses(
        (status = 200, description = "Success", body = Greeting),
        (status = 401, description = "Unauthorized", body = crate::infra::error::ErrorBody),
    ),
    security(("basic" = []))
)]
#[instrument(skip(service))]
async fn update_greeting(
    NewGreeting { greeting }: NewGreeting,
    State(service): State<GreetingService>,
) -> Json<Greeting> {
    Json(Greeting::new(service.set_greeting(greeting)))
}

/// Sets the greeting from a JSON body.
#[utoipa::path(
    post,
    path = "/greet/greeting",
    request_body = GreetingUpdate,
    responses(
        (status = 200, description = "Success", body = Greeting),
        (status = 400, description = "No greeting in the body", body = String),
    )
)]
#[instrument(skip(service))]
async fn update_greeting_from_json(
    _: CurrentGreeting,
    State(service): State<GreetingService>,
    Json(update): Json<GreetingUpdate>,
) -> ApiResult<Json<Greeting>> {
    let greeting = service.update(update)?;
    Ok(Json(Greeting::new(greeting)))
}

/// Sets the greeting from a JSON body after a delay.
#[utoipa::path(
    post,
    path = "/greet/slowgreeting",
    request_body = SlowGreetingUpdate,
    responses(
        (status = 200, description = "Success, after the delay", body = Greeting),
        (status = 400, description = "No greeting in the body", body = String),
    )
)]
#[instrument(name = "slow_greeting_request", skip(service))]
async fn update_greeting_slowly(
    _: SlowGreeting,
    State(service): State<GreetingService>,
    Json(update): Json<SlowGreetingUpdate>,
) -> ApiResult<Json<Greeting>> {
    let greeting = service.update_slowly(update).await?;
    Ok(Json(Greeting::new(greeting)))
}
