//! A service holding the greeting shared by every request.

use crate::infra::metrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinError;
use tracing::{instrument, Instrument};
use utoipa::ToSchema;

/// How long a slow update waits when the request does not say.
pub const DEFAULT_DELAY_SECS: u64 = 2;

/// Errors from updating the greeting.
#[derive(Debug, thiserror::Error)]
pub enum GreetingError {
    /// The update did not contain a usable greeting.
    #[error("No greeting in your JSON dude!")]
    MissingGreeting,
    /// The task performing a delayed update did not finish.
    #[error("greeting update failed: {0}")]
    UpdateFailed(#[from] JoinError),
}

/// A request to replace the greeting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GreetingUpdate {
    /// The new greeting.
    pub greeting: Option<String>,
}

/// A request to replace the greeting after a delay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlowGreetingUpdate {
    /// The new greeting.
    pub greeting: Option<String>,
    /// Seconds to wait before committing, two if absent.
    pub delay: Option<u64>,
}

/// The current greeting and the number of requests served.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct GreetingService {
    inner: Arc<Inner>,
}

struct Inner {
    greeting: RwLock<String>,
    requests: AtomicU64,
}

impl Debug for GreetingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreetingService")
            .field("greeting", &*self.inner.greeting.read())
            .field("requests", &self.request_count())
            .finish()
    }
}

impl GreetingService {
    /// Constructs a service starting out with `greeting`.
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                greeting: RwLock::new(greeting.into()),
                requests: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the current greeting.
    pub fn greeting(&self) -> String {
        self.inner.greeting.read().clone()
    }

    /// Replaces the greeting, returning the new one.
    #[instrument(skip(self))]
    pub fn set_greeting(&self, greeting: String) -> String {
        let mut current = self.inner.greeting.write();
        current.clone_from(&greeting);
        tracing::info!("Greeting updated");
        greeting
    }

    /// Greets someone by name.
    pub fn message(&self, name: &str) -> String {
        format!("{} {}!", self.inner.greeting.read(), name)
    }

    /// Greets the world.
    pub fn default_message(&self) -> String {
        self.message("World")
    }

    /// Counts one request, returning the new total.
    pub fn record_request(&self) -> u64 {
        metrics::inc_access_counter();
        self.inner.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The number of requests counted so far.
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Replaces the greeting with the one in `update`.
    pub fn update(&self, update: GreetingUpdate) -> Result<String, GreetingError> {
        let greeting = update.greeting.ok_or(GreetingError::MissingGreeting)?;
        Ok(self.set_greeting(greeting))
    }

    /// Replaces the greeting with the one in `update` once its delay has passed.
    ///
    /// The work runs on its own task inside an `update_greeting_slowly` span,
    /// so other requests are served meanwhile and the span closes once the
    /// outcome is known. An invalid update fails without waiting. Dropping the
    /// returned future does not cancel the update.
    pub async fn update_slowly(&self, update: SlowGreetingUpdate) -> Result<String, GreetingError> {
        let span = tracing::info_span!("update_greeting_slowly", delay_secs = tracing::field::Empty);
        let service = self.clone();
        let task = async move {
            let greeting = update.greeting.ok_or(GreetingError::MissingGreeting)?;
            let delay = update.delay.unwrap_or(DEFAULT_DELAY_SECS);
            tracing::Span::current().record("delay_secs", delay);
            tokio::time::sleep(Duration::from_secs(delay)).await;
            Ok::<_, GreetingError>(service.set_greeting(greeting))
        };
        tokio::spawn(task.instrument(span)).await?
    }
}
