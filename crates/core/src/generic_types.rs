use crate::template::{TemplateRenderer, VariableBindings};
use serde_json::json;

pub const DEFAULT_USER_NAME: &str = "Student";
pub const DEFAULT_AGENT_NAME: &str = "StudyBuddy";

/// The two people in a study session: the student and the agent persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pub user_name: String,
    pub agent_name: String,
}

impl Participants {
    pub fn new(user_name: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            agent_name: agent_name.into(),
        }
    }

    /// Reads `USER_NAME` and `AGENT_NAME` from the `secrets` namespace,
    /// falling back to the defaults when they are not configured.
    pub fn from_secrets(renderer: &TemplateRenderer) -> Self {
        Self {
            user_name: renderer.render_or("{{secrets.USER_NAME}}", DEFAULT_USER_NAME),
            agent_name: renderer.render_or("{{secrets.AGENT_NAME}}", DEFAULT_AGENT_NAME),
        }
    }

    /// Bindings for prompt templates: `base` (normally just the job
    /// metadata) plus a `session` namespace holding the participant names.
    pub fn prompt_bindings(&self, base: VariableBindings) -> VariableBindings {
        base.with_namespace(
            "session",
            json!({
                "user_name": self.user_name,
                "agent_name": self.agent_name,
            }),
        )
    }
}

/// Generic configuration handed to the voice pipeline when a session starts.
#[derive(Debug, Clone, Default)]
pub struct GenericSessionConfig {
    /// System instructions for the language model.
    pub instructions: String,
    /// First thing the agent says once the student joins.
    pub greeting: String,
}

impl GenericSessionConfig {
    pub fn render(
        renderer: &TemplateRenderer,
        instructions_template: &str,
        greeting_template: &str,
    ) -> Self {
        Self {
            instructions: renderer.render(instructions_template),
            greeting: renderer.render(greeting_template),
        }
    }

    /// Instructions with the greeting appended, for pipelines that only
    /// accept a single instruction string.
    pub fn advertised_instructions(&self) -> String {
        if self.greeting.is_empty() {
            return self.instructions.clone();
        }
        format!(
            "{}\n\n# Opening Line\nStart the session by saying: \"{}\"",
            self.instructions.trim_end(),
            self.greeting
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_participants_default_when_not_configured() {
        let renderer = TemplateRenderer::with_bindings(
            VariableBindings::from_metadata("{}").with_secrets(&HashMap::new()),
        );
        assert_eq!(
            Participants::from_secrets(&renderer),
            Participants::new(DEFAULT_USER_NAME, DEFAULT_AGENT_NAME)
        );
    }

    #[test]
    fn test_participants_from_secrets() {
        let secrets = HashMap::from([
            ("USER_NAME".to_string(), "Maya".to_string()),
            ("AGENT_NAME".to_string(), "Pip".to_string()),
        ]);
        let renderer =
            TemplateRenderer::with_bindings(VariableBindings::from_metadata("{}").with_secrets(&secrets));
        assert_eq!(Participants::from_secrets(&renderer), Participants::new("Maya", "Pip"));
    }

    #[test]
    fn test_session_config_renders_names_and_metadata() {
        let participants = Participants::new("Maya", "Pip");
        let renderer = TemplateRenderer::with_bindings(
            participants.prompt_bindings(VariableBindings::from_metadata(r#"{"subject": "cells"}"#)),
        );
        let config = GenericSessionConfig::render(
            &renderer,
            "You are {{session.agent_name}}, studying {{metadata.subject}} with {{session.user_name}}.",
            "Hello {{session.user_name}}! I'm {{session.agent_name}}.",
        );
        assert_eq!(config.instructions, "You are Pip, studying cells with Maya.");
        assert_eq!(config.greeting, "Hello Maya! I'm Pip.");
        assert!(
            config
                .advertised_instructions()
                .ends_with("Start the session by saying: \"Hello Maya! I'm Pip.\"")
        );
    }
}
