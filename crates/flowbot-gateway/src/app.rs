use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use flowbot_agent::pipeline::MessageContext;
use flowbot_agent::WorkflowExecutor;
use flowbot_core::config::FlowbotConfig;
use flowbot_deployments::DeploymentManager;
use flowbot_memory::MemoryManager;

use crate::http;

/// Shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: FlowbotConfig,
    pub executor: WorkflowExecutor,
    pub memory: MemoryManager,
    /// Shared with the subscription sweep.
    pub deployments: Arc<DeploymentManager>,
}

impl AppState {
    pub fn new(
        config: FlowbotConfig,
        executor: WorkflowExecutor,
        memory: MemoryManager,
        deployments: Arc<DeploymentManager>,
    ) -> Self {
        Self {
            config,
            executor,
            memory,
            deployments,
        }
    }
}

impl MessageContext for AppState {
    fn executor(&self) -> &WorkflowExecutor {
        &self.executor
    }

    fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    fn history_window(&self) -> usize {
        self.config.history.window
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // The widget is embedded on customer sites; origins are checked per
    // deployment by the adapter, not here.
    let widget = Router::new()
        .route(
            "/widget/{deployment_id}/messages",
            post(http::widget::widget_message),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Router::new()
        .route("/health", get(http::health::health_handler))
        .route(
            "/webhooks/telegram/{deployment_id}",
            post(http::webhooks::telegram_webhook),
        )
        .route(
            "/webhooks/slack/{deployment_id}",
            post(http::webhooks::slack_webhook),
        )
        .route(
            "/api/v1/deployments/{deployment_id}/messages",
            post(http::api::api_message),
        )
        .route(
            "/api/workflows/execute",
            post(http::workflows::execute_workflow),
        )
        .route(
            "/api/workflows/generate",
            post(http::workflows::generate_workflow),
        )
        .merge(widget)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
