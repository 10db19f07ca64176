//! Ordered stage pipeline.
//!
//! A [`Pipeline`] holds an ordered list of stages and runs a message through
//! them one after another. The first stage to reject stops the chain; the
//! rejection is reported together with the name of the stage that raised it.
//!
//! Pipelines are immutable once built. Stages are stored behind `Arc`, so the
//! same stage object can be shared by several pipelines (for example a global
//! chain and a per-route chain) without copying.

use crate::context::StageContext;
use crate::error::PipelineError;
use crate::stage::Stage;
use conduit_core::Message;
use std::sync::Arc;

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// An immutable, ordered chain of stages.
///
/// # Example
///
/// ```
/// use conduit_core::Message;
/// use conduit_middleware::{FnStage, Pipeline, StageContext};
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder()
///     .add_stage(FnStage::new("noop", |msg: Message| async move { Ok(msg) }))
///     .build();
///
/// let msg = Message::new("payload");
/// let mut ctx = StageContext::for_message(&msg);
/// let out = pipeline.run(&mut ctx, msg.clone()).await.unwrap();
/// assert_eq!(out, msg);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedStage>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Creates a pipeline with no stages.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Runs a message through every stage, in order.
    ///
    /// Returns the message as left by the last stage, or the first rejection.
    /// Stages after a rejecting stage are not invoked.
    pub async fn run(
        &self,
        ctx: &mut StageContext,
        message: Message,
    ) -> Result<Message, PipelineError> {
        let mut message = message;

        for stage in &self.stages {
            let name = stage.name();
            ctx.enter_stage(name);
            tracing::trace!(delivery_id = %ctx.delivery_id(), stage = name, "running stage");

            message = stage
                .process(ctx, message)
                .await
                .map_err(|source| PipelineError::new(name, source))?;
        }

        Ok(message)
    }

    /// Returns a new pipeline with `other`'s stages appended after these.
    #[must_use]
    pub fn chain(&self, other: &Pipeline) -> Pipeline {
        let mut stages = self.stages.clone();
        stages.extend(other.stages.iter().cloned());
        Pipeline { stages }
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[BoxedStage] {
        &self.stages
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedStage>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    #[must_use]
    pub fn add_stage<S: Stage>(self, stage: S) -> Self {
        self.add_shared(Arc::new(stage))
    }

    /// Appends a stage that may also be registered elsewhere.
    ///
    /// Registering two stages with the same name in one pipeline is allowed
    /// but logged: two decoders on one chain would decode the same payload twice.
    #[must_use]
    pub fn add_shared(mut self, stage: BoxedStage) -> Self {
        let name = stage.name();
        if self.stages.iter().any(|s| s.name() == name) {
            tracing::warn!(stage = name, "stage registered more than once in the same pipeline");
        }
        self.stages.push(stage);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no stages have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
