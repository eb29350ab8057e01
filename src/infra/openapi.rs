//! OpenAPI configuration.

use crate::feature::{
    greet::{greet_api, greet_service},
    health::health_api,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

/// OpenApi configuration.
#[derive(OpenApi)]
#[openapi(
    paths(
        greet_api::default_message,
        greet_api::named_message,
        greet_api::get_greeting,
        greet_api::update_greeting,
        greet_api::update_greeting_from_json,
        greet_api::update_greeting_slowly,
        health_api::health,
        health_api::ready,
    ),
    components(
        schemas(
            greet_api::Message,
            greet_api::Greeting,
            greet_service::GreetingUpdate,
            greet_service::SlowGreetingUpdate,
            health_api::Health,
            crate::infra::error::ErrorBody
        )
    ),
    modifiers(&SecurityAddon)
)]
#[derive(Clone, Copy, Debug)]
pub struct ApiDoc;

/// Security settings
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            )
        }
    }
}
