use flowbot_memory::MemoryManager;

use crate::workflow::{WorkflowExecutor, HISTORY_WINDOW};

/// What the pipeline needs from its host.
///
/// Implemented by the gateway's `AppState`; tests implement it over an
/// in-memory database and a scripted provider.
pub trait MessageContext: Send + Sync {
    fn executor(&self) -> &WorkflowExecutor;
    fn memory(&self) -> &MemoryManager;

    /// Prior turns loaded for each request.
    fn history_window(&self) -> usize {
        HISTORY_WINDOW
    }
}
