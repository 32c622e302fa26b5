use crate::{
    client::{CompletionClient, NO_CONTENT_PROVIDED},
    diagnostics::RunDiagnostics,
    error::{ErrorKind, Result},
    events::{emit, Event},
    publish::Publisher,
    source::{enforce_budget, ContentSource},
    stage::CompletionStage,
    tokenizer::{tokenizer_for_model, Tokenizer},
    types::{Artifact, ArtifactKind, ArtifactRef, SourceKind},
    PipelineError,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default input ceiling, in tokens.
pub const DEFAULT_TOKEN_LIMIT: usize = 2048;

/// Why a run ended in [`PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PipelineError> for FailureReason {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Lifecycle of a single pipeline run.
///
/// ```text
/// Idle → Acquiring → Budgeting → Stage1Completing ─┬─────────────────────► Publishing → Done
///                                                  └► Stage2Completing ──┘
/// any state ──(error or cancellation)──► Failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Budgeting,
    Stage1Completing,
    Stage2Completing,
    Publishing,
    Done,
    Failed(FailureReason),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

/// Which completion stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineShape {
    /// One summary stage.
    Summarize,
    /// An outline stage whose full output seeds an article stage.
    OutlineThenArticle,
}

impl PipelineShape {
    fn stages(&self, budgets: &OutputBudgets) -> Vec<CompletionStage> {
        match self {
            PipelineShape::Summarize => vec![CompletionStage::summarize(budgets.summary)],
            PipelineShape::OutlineThenArticle => vec![
                CompletionStage::outline(budgets.outline),
                CompletionStage::article(budgets.article),
            ],
        }
    }

    /// Document title for the artifact this shape produces from `source`.
    pub fn title(&self, source: SourceKind) -> &'static str {
        match (self, source) {
            (PipelineShape::Summarize, SourceKind::Video) => "YouTube Transcript Summary",
            (PipelineShape::Summarize, SourceKind::Web) => "Website Summary",
            (PipelineShape::OutlineThenArticle, SourceKind::Video) => "YouTube Transcript Article",
            (PipelineShape::OutlineThenArticle, SourceKind::Web) => "Website Article",
        }
    }
}

/// What to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// A video URL (`watch?v=` or `/shorts/` form).
    Video(String),
    /// A web page URL.
    Web(String),
}

impl SourceRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRequest::Video(_) => SourceKind::Video,
            SourceRequest::Web(_) => SourceKind::Web,
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            SourceRequest::Video(r) | SourceRequest::Web(r) => r,
        }
    }
}

/// Output token budgets per stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBudgets {
    pub summary: u32,
    pub outline: u32,
    pub article: u32,
}

impl Default for OutputBudgets {
    fn default() -> Self {
        Self {
            summary: 500,
            outline: 800,
            article: 800,
        }
    }
}

/// Report of one run: every state visited plus whatever was produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub request: SourceRequest,
    pub shape: PipelineShape,

    /// States in the order they were entered, starting with `Idle`.
    pub history: Vec<PipelineState>,

    /// Stage 1 output of an outline-then-article run.
    pub outline: Option<String>,

    /// The final artifact, once every stage has succeeded.
    pub artifact: Option<Artifact>,

    /// Where the artifact was stored, including any local fallback copy.
    pub published: Vec<ArtifactRef>,

    pub diagnostics: RunDiagnostics,
}

impl PipelineRun {
    fn new(request: SourceRequest, shape: PipelineShape) -> Self {
        Self {
            request,
            shape,
            history: vec![PipelineState::Idle],
            outline: None,
            artifact: None,
            published: Vec::new(),
            diagnostics: RunDiagnostics::default(),
        }
    }

    /// The state the run ended in.
    pub fn state(&self) -> &PipelineState {
        self.history.last().unwrap_or(&PipelineState::Idle)
    }

    /// First published reference, if any.
    pub fn reference(&self) -> Option<&ArtifactRef> {
        self.published.first()
    }
}

/// A failed run: the report up to the failure, and the error that ended it.
#[derive(Debug)]
pub struct RunFailure {
    pub run: PipelineRun,
    pub error: PipelineError,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The content pipeline: acquire, budget, complete, publish.
///
/// Stages run strictly in order; stage 2 only runs when stage 1 succeeded
/// and nothing is published unless every stage succeeded.
pub struct Pipeline {
    video: Option<Arc<dyn ContentSource>>,
    web: Option<Arc<dyn ContentSource>>,
    tokenizer: Arc<dyn Tokenizer>,
    client: CompletionClient,
    publishers: Vec<Arc<dyn Publisher>>,
    fallback: Option<Arc<dyn Publisher>>,
    token_limit: usize,
    budgets: OutputBudgets,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("video", &self.video.as_ref().map(|s| s.name()))
            .field("web", &self.web.as_ref().map(|s| s.name()))
            .field(
                "publishers",
                &self.publishers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.as_ref().map(|p| p.name()))
            .field("token_limit", &self.token_limit)
            .field("budgets", &self.budgets)
            .field("client", &self.client)
            .finish()
    }
}

impl Pipeline {
    /// Create a new pipeline builder around a completion client.
    pub fn builder(client: CompletionClient) -> PipelineBuilder {
        PipelineBuilder::new(client)
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Execute one run.
    ///
    /// On failure the returned [`RunFailure`] still carries the report; when
    /// only publishing failed, that report includes the artifact and any
    /// local fallback reference.
    pub async fn run(
        &self,
        request: SourceRequest,
        shape: PipelineShape,
    ) -> std::result::Result<PipelineRun, RunFailure> {
        let mut run = PipelineRun::new(request.clone(), shape);
        info!(
            source = ?request.kind(),
            reference = request.reference(),
            shape = ?shape,
            "pipeline run started"
        );

        match self.drive(&request, shape, &mut run).await {
            Ok(()) => {
                self.transition(&mut run, PipelineState::Done);
                info!(
                    completions = run.diagnostics.completions,
                    rate_limit_waits = run.diagnostics.rate_limit_waits,
                    "pipeline run finished"
                );
                Ok(run)
            }
            Err(error) => {
                self.transition(&mut run, PipelineState::Failed(FailureReason::from(&error)));
                error!(kind = ?error.kind(), error = %error, "pipeline run failed");
                Err(RunFailure { run, error })
            }
        }
    }

    async fn drive(
        &self,
        request: &SourceRequest,
        shape: PipelineShape,
        run: &mut PipelineRun,
    ) -> Result<()> {
        self.enter(run, PipelineState::Acquiring)?;
        let source = self.source_for(request)?;
        let text = source.acquire(request.reference()).await?;
        let origin = text.origin.kind;

        self.enter(run, PipelineState::Budgeting)?;
        let budgeted = enforce_budget(self.tokenizer.as_ref(), text, self.token_limit);
        run.diagnostics.truncated_input = budgeted.truncated;
        run.diagnostics.input_tokens = budgeted.token_count;

        let stages = shape.stages(&self.budgets);
        let total = stages.len();
        let mut current = budgeted.text;
        let mut kind = ArtifactKind::Summary;

        for (index, stage) in stages.iter().enumerate() {
            let state = if index == 0 {
                PipelineState::Stage1Completing
            } else {
                PipelineState::Stage2Completing
            };
            self.enter(run, state)?;
            emit(
                self.client.event_handler(),
                Event::StageStart {
                    name: stage.name.clone(),
                    index,
                    total,
                },
            );

            let result = self.complete_stage(stage, &current, run).await;
            emit(
                self.client.event_handler(),
                Event::StageEnd {
                    name: stage.name.clone(),
                    ok: result.is_ok(),
                },
            );
            current = result?;

            if stage.kind == ArtifactKind::Outline {
                run.outline = Some(current.clone());
            }
            kind = stage.kind;
        }

        let artifact = Artifact::new(kind, shape.title(origin), current);
        run.artifact = Some(artifact.clone());

        self.enter(run, PipelineState::Publishing)?;
        self.publish(&artifact, run).await
    }

    async fn complete_stage(
        &self,
        stage: &CompletionStage,
        input: &str,
        run: &mut PipelineRun,
    ) -> Result<String> {
        if stage.kind == ArtifactKind::Summary && input.trim().is_empty() {
            return Ok(NO_CONTENT_PROVIDED.to_string());
        }
        let (text, diagnostics) = self
            .client
            .complete_with_diagnostics(
                &stage.name,
                stage.messages(input),
                stage.max_output_tokens,
                self.client.model(),
            )
            .await?;
        run.diagnostics.record(&diagnostics);
        Ok(text)
    }

    async fn publish(&self, artifact: &Artifact, run: &mut PipelineRun) -> Result<()> {
        for publisher in &self.publishers {
            match publisher.publish(artifact).await {
                Ok(reference) => {
                    emit(
                        self.client.event_handler(),
                        Event::Published {
                            publisher: publisher.name(),
                            outcome: Ok(reference.to_string()),
                        },
                    );
                    run.published.push(reference);
                }
                Err(err) => {
                    emit(
                        self.client.event_handler(),
                        Event::Published {
                            publisher: publisher.name(),
                            outcome: Err(err.to_string()),
                        },
                    );
                    self.save_fallback(artifact, run).await;
                    return Err(match err {
                        PipelineError::PublishFailure(_) => err,
                        other => PipelineError::PublishFailure(other.to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    async fn save_fallback(&self, artifact: &Artifact, run: &mut PipelineRun) {
        let Some(ref fallback) = self.fallback else {
            return;
        };
        match fallback.publish(artifact).await {
            Ok(reference) => {
                warn!(reference = %reference, "upload failed, artifact kept locally");
                run.published.push(reference);
            }
            Err(err) => warn!(error = %err, "local fallback save failed"),
        }
    }

    fn source_for(&self, request: &SourceRequest) -> Result<&Arc<dyn ContentSource>> {
        let source = match request {
            SourceRequest::Video(_) => self.video.as_ref(),
            SourceRequest::Web(_) => self.web.as_ref(),
        };
        source.ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "no {:?} source configured",
                request.kind()
            ))
        })
    }

    /// Check cancellation, then move to `next`.
    fn enter(&self, run: &mut PipelineRun, next: PipelineState) -> Result<()> {
        if let Some(cancel) = self.client.cancellation() {
            cancel.check()?;
        }
        self.transition(run, next);
        Ok(())
    }

    fn transition(&self, run: &mut PipelineRun, next: PipelineState) {
        let from = run.state().clone();
        run.history.push(next.clone());
        emit(
            self.client.event_handler(),
            Event::StateChanged { from, to: next },
        );
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    client: CompletionClient,
    video: Option<Arc<dyn ContentSource>>,
    web: Option<Arc<dyn ContentSource>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    publishers: Vec<Arc<dyn Publisher>>,
    fallback: Option<Arc<dyn Publisher>>,
    token_limit: usize,
    budgets: OutputBudgets,
}

impl PipelineBuilder {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            video: None,
            web: None,
            tokenizer: None,
            publishers: Vec::new(),
            fallback: None,
            token_limit: DEFAULT_TOKEN_LIMIT,
            budgets: OutputBudgets::default(),
        }
    }

    pub fn video_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.video = Some(source);
        self
    }

    pub fn web_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.web = Some(source);
        self
    }

    /// Tokenizer for budgeting. Default: the client model's encoding.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Add a publisher. Publishers run in insertion order.
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Where the artifact goes when a publisher fails.
    pub fn local_fallback(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.fallback = Some(publisher);
        self
    }

    pub fn token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    pub fn output_budgets(mut self, budgets: OutputBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if self.token_limit == 0 {
            return Err(PipelineError::InvalidConfig(
                "token limit must be greater than zero".to_string(),
            ));
        }
        if self.video.is_none() && self.web.is_none() {
            return Err(PipelineError::InvalidConfig(
                "pipeline needs at least one source".to_string(),
            ));
        }
        for stage in PipelineShape::OutlineThenArticle
            .stages(&self.budgets)
            .iter()
            .chain(PipelineShape::Summarize.stages(&self.budgets).iter())
        {
            stage.validate()?;
        }

        let tokenizer = match self.tokenizer {
            Some(t) => t,
            None => Arc::from(tokenizer_for_model(self.client.model())),
        };

        Ok(Pipeline {
            video: self.video,
            web: self.web,
            tokenizer,
            client: self.client,
            publishers: self.publishers,
            fallback: self.fallback,
            token_limit: self.token_limit,
            budgets: self.budgets,
        })
    }
}
