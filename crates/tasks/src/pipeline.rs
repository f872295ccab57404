//! Submission pipeline: HTTP submit, subscribe, await, validate.
//!
//! [`TaskClient::submit`] runs the steps in order and stops at the first
//! failure:
//!
//! 1. `POST` the job payload; a non-2xx status fails the call.
//! 2. Read `taskId` from the response; a missing id fails before any
//!    connection is attempted.
//! 3. Reuse or open the shared task-channel connection.
//! 4. Subscribe to the task and wait for its terminal frame, forwarding
//!    progress to the caller.
//! 5. Validate the result payload against the expected schema.

use std::sync::Arc;

use gaia_core::error::CoreError;
use gaia_core::module::Module;
use gaia_core::module_outline::{GenerateModuleOutline, ModuleOutline};
use gaia_core::types::{TaskType, MSG_TYPE_SUBSCRIBE};
use gaia_core::validation::{PayloadValidator, SchemaValidator};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, GenerationApi};
use crate::config::ClientConfig;
use crate::manager::ConnectionManager;
use crate::router::ProgressSender;
use crate::subscription::{SubscriptionError, SubscriptionOptions, TaskSubscription};

/// Client for running generation jobs end to end.
///
/// Cheap to clone; clones share the HTTP client and the task-channel
/// connection. Dropping a generation future abandons the job; to stop jobs
/// from elsewhere, use [`with_cancellation`](Self::with_cancellation).
#[derive(Clone)]
pub struct TaskClient {
    api: GenerationApi,
    connections: Arc<ConnectionManager>,
    options: SubscriptionOptions,
    cancel: CancellationToken,
}

impl TaskClient {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::Request)?;

        Ok(Self::from_parts(
            GenerationApi::with_client(http, config.api_url.clone()),
            ConnectionManager::new(config.ws_url.clone()),
            config.subscription_options(),
        ))
    }

    pub fn from_parts(
        api: GenerationApi,
        connections: Arc<ConnectionManager>,
        options: SubscriptionOptions,
    ) -> Self {
        Self {
            api,
            connections,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// A client whose calls fail with [`SubscriptionError::Cancelled`] once
    /// `token` is cancelled. Subscriptions still waiting are detached.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    /// The shared task-channel connection manager.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Submit a job and wait for its validated result.
    pub async fn submit<P, V>(
        &self,
        task_type: TaskType,
        payload: &P,
        validator: &V,
        progress: Option<ProgressSender>,
    ) -> Result<V::Output, GenerationError>
    where
        P: Serialize + ?Sized,
        V: PayloadValidator,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::info!(%task_type, "Generation cancelled");
                Err(SubscriptionError::Cancelled.into())
            }
            result = self.run_job(task_type, payload, validator, progress) => result,
        }
    }

    /// Generate a module outline from user-supplied parameters.
    ///
    /// The request is cleaned and checked before anything is sent.
    pub async fn generate_module_outline(
        &self,
        request: &GenerateModuleOutline,
        progress: Option<ProgressSender>,
    ) -> Result<ModuleOutline, GenerationError> {
        let request = request.cleaned();
        request.validate().map_err(GenerationError::InvalidPayload)?;

        self.submit(
            TaskType::ModuleOutline,
            &request,
            &SchemaValidator::<ModuleOutline>::new(),
            progress,
        )
        .await
    }

    /// Generate a full module from an (optionally edited) outline.
    pub async fn generate_module(
        &self,
        outline: &ModuleOutline,
        progress: Option<ProgressSender>,
    ) -> Result<Module, GenerationError> {
        let outline = outline.cleaned();
        outline.validate().map_err(GenerationError::InvalidPayload)?;

        self.submit(
            TaskType::Module,
            &outline,
            &SchemaValidator::<Module>::new(),
            progress,
        )
        .await
    }

    /// Generate a full module in one synchronous request to the crew
    /// endpoint, without a task subscription.
    pub async fn generate_module_crew(
        &self,
        request: &GenerateModuleOutline,
    ) -> Result<Module, GenerationError> {
        let request = request.cleaned();
        request.validate().map_err(GenerationError::InvalidPayload)?;

        let payload = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SubscriptionError::Cancelled.into()),
            payload = self.api.generate_module_crew(&request) => payload?,
        };
        SchemaValidator::<Module>::new()
            .validate(payload)
            .map_err(GenerationError::InvalidResult)
    }

    // ---- private helpers ----

    async fn run_job<P, V>(
        &self,
        task_type: TaskType,
        payload: &P,
        validator: &V,
        progress: Option<ProgressSender>,
    ) -> Result<V::Output, GenerationError>
    where
        P: Serialize + ?Sized,
        V: PayloadValidator,
    {
        let submitted = self.api.submit_task(task_type, payload).await?;
        let task_id = submitted.task_id;
        tracing::info!(task_id = %task_id, %task_type, "Generation task submitted");

        let connection = self.connections.ensure_connected();
        let subscription = TaskSubscription::subscribe(
            &connection,
            self.connections.router(),
            &task_id,
            task_type,
            MSG_TYPE_SUBSCRIBE,
            progress,
            self.options,
        )?;
        drop(connection);

        let payload = subscription.outcome().await?;

        validator.validate(payload).map_err(|e| {
            tracing::warn!(task_id = %task_id, error = %e, "Task result failed validation");
            GenerationError::InvalidResult(e)
        })
    }
}

/// Every way a generation call can fail.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The job payload failed local checks; nothing was sent.
    #[error("Invalid job payload: {0}")]
    InvalidPayload(CoreError),

    /// Submission failed at the HTTP layer.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The task failed, was lost, or timed out after submission.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// The task finished but its result does not match the schema.
    #[error("Received invalid result: {0}")]
    InvalidResult(CoreError),
}

impl GenerationError {
    /// Stable category name for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "invalid-payload",
            Self::Api(e) => e.kind(),
            Self::Subscription(e) => e.kind(),
            Self::InvalidResult(_) => "invalid-result-shape",
        }
    }
}
