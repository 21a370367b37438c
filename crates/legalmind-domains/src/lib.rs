pub mod agents;
pub mod classifier;
pub mod clauses;
pub mod compliance;
pub mod extract;
pub mod render;
pub mod risk;
pub mod tools;
pub mod workflows;

use legalmind_core::agent::{AgentCatalog, AgentKind, AgentProfile, Selection, WorkflowTemplate};

pub use tools::default_registry;

/// The built-in agents and workflows.
pub struct LegalCatalog {
    profiles: Vec<AgentProfile>,
    workflows: Vec<WorkflowTemplate>,
}

impl LegalCatalog {
    pub fn new() -> Self {
        Self {
            profiles: agents::all_profiles(),
            workflows: workflows::all_workflows(),
        }
    }
}

impl Default for LegalCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentCatalog for LegalCatalog {
    fn profile(&self, kind: AgentKind) -> &AgentProfile {
        // all_profiles() covers every kind; the assistant is last
        self.profiles
            .iter()
            .find(|p| p.kind == kind)
            .or_else(|| self.profiles.last())
            .unwrap_or_else(|| unreachable!("agent catalog is empty"))
    }

    fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    fn classify(&self, text: &str) -> Selection {
        classifier::classify(text)
    }

    fn workflow(&self, name: &str) -> Option<&WorkflowTemplate> {
        self.workflows.iter().find(|w| w.name == name)
    }

    fn workflows(&self) -> &[WorkflowTemplate] {
        &self.workflows
    }
}
