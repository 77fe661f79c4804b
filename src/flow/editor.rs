use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use strum_macros::Display;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::FlowError;
use super::graph::{self, BrokenLink};
use super::journey::{self, JourneyOutcome};
use super::model::{ButtonLink, Flow, FlowStep, StepPatch};
use crate::api::ApiError;
use crate::notifier::Notifier;

/// Persists a whole flow and returns the id the server assigned.
#[async_trait]
pub trait FlowBackend: Send + Sync {
    async fn save_flow(&self, flow: &Flow, is_published: bool) -> Result<String, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FlowState {
    Empty,
    Editing,
    DraftSaved,
    Published,
}

/// Working copy of one flow plus its edit state.
#[derive(Debug)]
pub struct FlowEditor {
    flow: Flow,
    state: FlowState,
    saving: Arc<AtomicBool>,
    notifier: Option<Notifier>,
}

impl Default for FlowEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowEditor {
    pub fn new() -> Self {
        Self {
            flow: Flow::new(""),
            state: FlowState::Empty,
            saving: Arc::new(AtomicBool::new(false)),
            notifier: None,
        }
    }

    /// Re-opens a flow fetched from the server or a file.
    pub fn open(mut flow: Flow) -> Self {
        flow.sort_by_order();
        let state = if flow.id.is_none() && flow.steps.is_empty() {
            FlowState::Empty
        } else if flow.is_published {
            FlowState::Published
        } else if flow.id.is_some() {
            FlowState::DraftSaved
        } else {
            FlowState::Editing
        };
        Self {
            flow,
            state,
            saving: Arc::new(AtomicBool::new(false)),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn into_flow(self) -> Flow {
        self.flow
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn steps(&self) -> &[FlowStep] {
        &self.flow.steps
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Shared view of the saving flag, for a caller that renders it while a
    /// save is awaited. `save_flow` borrows the editor mutably, so saves on
    /// one editor never overlap.
    pub fn saving_flag(&self) -> Arc<AtomicBool> {
        self.saving.clone()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.flow.flow_name = name.into();
        self.touch();
    }

    pub fn set_active(&mut self, active: bool) {
        self.flow.is_active = active;
        self.touch();
    }

    pub fn add_step(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        let order = self.flow.steps.len() as u32 + 1;
        self.flow.steps.push(FlowStep::new(id.clone(), order));
        debug!(step_id = %id, order, "step added");
        self.touch();
        id
    }

    pub fn edit_step(&mut self, id: &str, patch: StepPatch) -> Result<(), FlowError> {
        let step = self
            .flow
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| FlowError::StepNotFound(id.to_string()))?;
        patch.apply(step);
        self.touch();
        Ok(())
    }

    /// Removes the step at `index`. Links pointing at it stay and become
    /// broken.
    pub fn delete_step(&mut self, index: usize) -> Result<FlowStep, FlowError> {
        let len = self.flow.steps.len();
        if index >= len {
            return Err(FlowError::IndexOutOfRange { index, len });
        }
        let removed = self.flow.steps.remove(index);
        self.flow.renumber();
        debug!(step_id = %removed.id, index, "step deleted");
        self.touch();
        Ok(removed)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), FlowError> {
        let len = self.flow.steps.len();
        for index in [from, to] {
            if index >= len {
                return Err(FlowError::IndexOutOfRange { index, len });
            }
        }
        let step = self.flow.steps.remove(from);
        self.flow.steps.insert(to, step);
        self.flow.renumber();
        self.touch();
        Ok(())
    }

    /// Points `from_id`'s button `label` at `to_id`, replacing an existing
    /// link with that label. The target is not checked.
    pub fn link_step(&mut self, from_id: &str, label: &str, to_id: &str) -> Result<(), FlowError> {
        let step = self
            .flow
            .steps
            .iter_mut()
            .find(|s| s.id == from_id)
            .ok_or_else(|| FlowError::StepNotFound(from_id.to_string()))?;
        match step.button_links.iter_mut().find(|l| l.button_text == label) {
            Some(link) => link.next_step_id = Some(to_id.to_string()),
            None => step
                .button_links
                .push(ButtonLink::new(label, Some(to_id.to_string()))),
        }
        self.touch();
        Ok(())
    }

    pub fn unlink_step(&mut self, from_id: &str, label: &str) -> Result<bool, FlowError> {
        let step = self
            .flow
            .steps
            .iter_mut()
            .find(|s| s.id == from_id)
            .ok_or_else(|| FlowError::StepNotFound(from_id.to_string()))?;
        let before = step.button_links.len();
        step.button_links.retain(|l| l.button_text != label);
        let removed = step.button_links.len() != before;
        if removed {
            self.touch();
        }
        Ok(removed)
    }

    pub fn broken_links(&self) -> Vec<BrokenLink> {
        graph::broken_links(&self.flow)
    }

    pub fn cycles(&self) -> Vec<Vec<String>> {
        graph::cycles(&self.flow)
    }

    pub fn simulate_journey(&self) -> JourneyOutcome {
        journey::simulate(&self.flow)
    }

    /// Checks what a save needs: a name and at least one step.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.flow.flow_name.trim().is_empty() {
            return Err(FlowError::Validation("flow name is required".into()));
        }
        if self.flow.steps.is_empty() {
            return Err(FlowError::Validation("add at least one step".into()));
        }
        Ok(())
    }

    pub async fn save_flow(
        &mut self,
        is_published: bool,
        backend: &dyn FlowBackend,
    ) -> Result<String, FlowError> {
        if let Err(err) = self.validate() {
            warn!(error = %err, "flow not saved");
            if let Some(notifier) = &self.notifier {
                notifier.warning(&err.to_string());
            }
            return Err(err);
        }
        self.saving.store(true, Ordering::SeqCst);
        let _saving = SavingGuard(self.saving.clone());

        self.flow.renumber();
        let id = backend.save_flow(&self.flow, is_published).await?;

        self.flow.id = Some(id.clone());
        self.flow.is_published = is_published;
        self.state = if is_published {
            FlowState::Published
        } else {
            FlowState::DraftSaved
        };
        info!(flow_id = %id, state = %self.state, "flow saved");
        if let Some(notifier) = &self.notifier {
            notifier.success(if is_published {
                "Flow published"
            } else {
                "Draft saved"
            });
        }
        Ok(id)
    }

    fn touch(&mut self) {
        self.state = FlowState::Editing;
    }
}

struct SavingGuard(Arc<AtomicBool>);

impl Drop for SavingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
