use crate::{
    error::Result,
    prompt::{self, ARTICLE_TEMPLATE, OUTLINE_TEMPLATE, SUMMARY_SYSTEM},
    types::{ArtifactKind, ChatMessage},
    PipelineError,
};

/// A single completion stage in a pipeline shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionStage {
    /// Name of the stage (for logging/progress).
    pub name: String,

    /// Prompt template with an `{input}` placeholder.
    pub prompt_template: String,

    /// Optional system message sent before the user prompt.
    pub system_prompt: Option<String>,

    /// Output token budget passed to the backend as `max_tokens`.
    pub max_output_tokens: u32,

    /// What this stage produces.
    pub kind: ArtifactKind,
}

impl CompletionStage {
    /// Create a new stage with a prompt template.
    ///
    /// The template supports `{input}` for the source text or the previous
    /// stage's output.
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            system_prompt: None,
            max_output_tokens: 800,
            kind,
        }
    }

    /// Summary stage: the content is sent as-is after the summarize instruction.
    pub fn summarize(max_output_tokens: u32) -> Self {
        Self::new("summarize", ArtifactKind::Summary, "{input}")
            .with_system_prompt(SUMMARY_SYSTEM)
            .with_max_tokens(max_output_tokens)
    }

    pub fn outline(max_output_tokens: u32) -> Self {
        Self::new("outline", ArtifactKind::Outline, OUTLINE_TEMPLATE)
            .with_max_tokens(max_output_tokens)
    }

    pub fn article(max_output_tokens: u32) -> Self {
        Self::new("article", ArtifactKind::Article, ARTICLE_TEMPLATE)
            .with_max_tokens(max_output_tokens)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Render the user prompt for `input`.
    pub fn render_prompt(&self, input: &str) -> String {
        prompt::render(&self.prompt_template, input)
    }

    /// Build the message list for one request: system first when set.
    pub fn messages(&self, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.render_prompt(input)));
        messages
    }

    /// Reject stages that could never produce a request.
    pub fn validate(&self) -> Result<()> {
        if self.prompt_template.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "stage '{}' has an empty prompt template",
                self.name
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "stage '{}' has a zero output budget",
                self.name
            )));
        }
        Ok(())
    }
}
