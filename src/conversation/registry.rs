use std::collections::HashMap;
use std::sync::Arc;

use super::flow::FlowHandler;
use super::flows::{AddUserFlow, RemoveUserFlow, SetBookFlow, SetProgressFlow};
use super::status::{ConversationStatus, FlowId, Step};
use crate::core::error::{AppError, AppResult};

/// Immutable map from step tags (and flow ids) to flow handlers.
///
/// Built once at startup and shared read-only by every routed event.
pub struct StateRegistry {
    by_step: HashMap<Step, Arc<dyn FlowHandler>>,
    by_flow: HashMap<FlowId, Arc<dyn FlowHandler>>,
}

impl StateRegistry {
    /// Registers `handlers`, rejecting a step claimed twice or by a foreign flow
    pub fn new(handlers: Vec<Arc<dyn FlowHandler>>) -> AppResult<Self> {
        let mut by_step = HashMap::new();
        let mut by_flow = HashMap::new();

        for handler in handlers {
            let flow = handler.id();
            if by_flow.insert(flow, Arc::clone(&handler)).is_some() {
                return Err(AppError::Config(format!("flow {} registered twice", flow)));
            }
            for &step in handler.steps() {
                if step.flow() != flow {
                    return Err(AppError::Config(format!("step {} does not belong to flow {}", step, flow)));
                }
                if by_step.insert(step, Arc::clone(&handler)).is_some() {
                    return Err(AppError::Config(format!("step {} declared twice", step)));
                }
            }
        }

        Ok(Self { by_step, by_flow })
    }

    /// Registry with the four club flows
    pub fn with_default_flows() -> AppResult<Self> {
        Self::new(vec![
            Arc::new(SetProgressFlow),
            Arc::new(SetBookFlow),
            Arc::new(AddUserFlow),
            Arc::new(RemoveUserFlow),
        ])
    }

    /// Handler responsible for a stored status.
    ///
    /// Idle has no handler; a corrupted or unregistered step is `UnknownStatus`.
    pub fn resolve(&self, status: &ConversationStatus) -> AppResult<(Arc<dyn FlowHandler>, Step)> {
        match status {
            ConversationStatus::InFlow { step, .. } => self
                .by_step
                .get(step)
                .map(|handler| (Arc::clone(handler), *step))
                .ok_or_else(|| AppError::UnknownStatus(step.to_string())),
            ConversationStatus::Corrupted(raw) => Err(AppError::UnknownStatus(raw.clone())),
            ConversationStatus::Idle => Err(AppError::UnknownStatus(String::new())),
        }
    }

    pub fn flow(&self, id: FlowId) -> Option<Arc<dyn FlowHandler>> {
        self.by_flow.get(&id).cloned()
    }

    pub fn step_count(&self) -> usize {
        self.by_step.len()
    }
}
