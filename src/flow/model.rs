use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One button on a step and the step it leads to. The backend expects these
/// two fields in PascalCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ButtonLink {
    #[serde(rename = "ButtonText")]
    pub button_text: String,
    #[serde(rename = "NextStepId", default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

impl ButtonLink {
    pub fn new(button_text: impl Into<String>, next_step_id: Option<String>) -> Self {
        Self {
            button_text: button_text.into(),
            next_step_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub id: String,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub button_links: Vec<ButtonLink>,
    /// 1-based rank, contiguous over the flow.
    #[serde(default)]
    pub step_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_body: Option<String>,
}

impl FlowStep {
    pub fn new(id: impl Into<String>, step_order: u32) -> Self {
        Self {
            id: id.into(),
            button_text: String::new(),
            template_name: String::new(),
            button_links: Vec::new(),
            step_order,
            template_type: None,
            message_body: None,
        }
    }

    pub fn link(&self, button_text: &str) -> Option<&ButtonLink> {
        self.button_links
            .iter()
            .find(|l| l.button_text == button_text)
    }

    /// Target of the first button, which is the path a journey follows.
    pub fn first_target(&self) -> Option<&str> {
        self.button_links
            .first()
            .and_then(|l| l.next_step_id.as_deref())
    }
}

/// A CTA flow document as stored by the server and in local flow files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub flow_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

fn default_true() -> bool {
    true
}

impl Flow {
    pub fn new(flow_name: impl Into<String>) -> Self {
        Self {
            id: None,
            flow_name: flow_name.into(),
            is_active: true,
            is_published: false,
            steps: Vec::new(),
        }
    }

    pub fn step(&self, id: &str) -> Option<&FlowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Rewrites `stepOrder` to 1..N following the list order.
    pub fn renumber(&mut self) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            step.step_order = idx as u32 + 1;
        }
    }

    /// Puts steps in `stepOrder` sequence, e.g. after loading from the server.
    pub fn sort_by_order(&mut self) {
        self.steps.sort_by_key(|s| s.step_order);
        self.renumber();
    }

    pub fn is_contiguous(&self) -> bool {
        self.steps
            .iter()
            .enumerate()
            .all(|(idx, s)| s.step_order == idx as u32 + 1)
    }
}

/// Fields `edit_step` may change. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPatch {
    pub button_text: Option<String>,
    pub template_name: Option<String>,
    pub template_type: Option<String>,
    pub message_body: Option<String>,
    pub button_links: Option<Vec<ButtonLink>>,
}

impl StepPatch {
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            template_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_button_text(mut self, text: impl Into<String>) -> Self {
        self.button_text = Some(text.into());
        self
    }

    pub fn with_links(mut self, links: Vec<ButtonLink>) -> Self {
        self.button_links = Some(links);
        self
    }

    pub(crate) fn apply(self, step: &mut FlowStep) {
        if let Some(text) = self.button_text {
            step.button_text = text;
        }
        if let Some(name) = self.template_name {
            step.template_name = name;
        }
        if let Some(kind) = self.template_type {
            step.template_type = Some(kind);
        }
        if let Some(body) = self.message_body {
            step.message_body = Some(body);
        }
        if let Some(links) = self.button_links {
            step.button_links = links;
        }
    }
}
