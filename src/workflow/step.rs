//! 流程步骤
//!
//! 每个步骤只声明自己是什么（[`StepKind`]）和怎么跑（[`Step::run`]）；
//! 计时、日志、错误分类统一由 [`execute`] 完成，步骤不能改写

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::models::{
    CandidateItem, GenerationRequest, RetrievedContext, TopicPlan, ValidationResult,
    VisualArtifact,
};
use crate::services::{
    ContentGenerator, ContentValidator, ContextRetriever, GenerationFeedback, VisualGenerator,
    VisualValidator,
};
use crate::workflow::generation_ctx::GenerationCtx;

/// 步骤类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    RetrieveContext,
    GenerateItem,
    ValidateItem,
    GenerateVisual,
    ValidateVisual,
}

impl StepKind {
    pub fn name(self) -> &'static str {
        match self {
            StepKind::RetrieveContext => "检索参考资料",
            StepKind::GenerateItem => "出题",
            StepKind::ValidateItem => "审题",
            StepKind::GenerateVisual => "配图生成",
            StepKind::ValidateVisual => "配图审核",
        }
    }
}

#[async_trait]
pub trait Step: Send + Sync {
    type Output: Send;

    fn kind(&self) -> StepKind;

    async fn run(&self, ctx: &GenerationCtx) -> AppResult<Self::Output>;
}

/// 统一执行入口
pub async fn execute<S: Step>(step: &S, ctx: &GenerationCtx) -> AppResult<S::Output> {
    let kind = step.kind();
    let started = Instant::now();
    let result = step.run(ctx).await;
    let elapsed = started.elapsed().as_millis();

    match &result {
        Ok(_) => debug!("{} ✓ {} 完成 ({} ms)", ctx, kind.name(), elapsed),
        Err(e) if e.is_upstream_limit() => {
            warn!("{} 🛑 {} 遇到上游限制 ({:?}): {}", ctx, kind.name(), e.kind(), e)
        }
        Err(e) => warn!("{} ⚠️ {} 失败 ({} ms): {}", ctx, kind.name(), elapsed, e),
    }
    result
}

// ========== 具体步骤 ==========

pub struct RetrieveContextStep<'a> {
    pub retriever: &'a ContextRetriever,
    pub request: &'a GenerationRequest,
}

#[async_trait]
impl<'a> Step for RetrieveContextStep<'a> {
    type Output = RetrievedContext;

    fn kind(&self) -> StepKind {
        StepKind::RetrieveContext
    }

    async fn run(&self, ctx: &GenerationCtx) -> AppResult<RetrievedContext> {
        Ok(self.retriever.retrieve(self.request, &ctx.to_string()).await)
    }
}

pub struct GenerateItemStep<'a> {
    pub generator: &'a ContentGenerator,
    pub request: &'a GenerationRequest,
    pub plan: &'a TopicPlan,
    pub context: &'a RetrievedContext,
    pub feedback: Option<&'a GenerationFeedback>,
}

#[async_trait]
impl<'a> Step for GenerateItemStep<'a> {
    type Output = CandidateItem;

    fn kind(&self) -> StepKind {
        StepKind::GenerateItem
    }

    async fn run(&self, _ctx: &GenerationCtx) -> AppResult<CandidateItem> {
        self.generator
            .generate(self.request, self.plan, self.context, self.feedback)
            .await
    }
}

pub struct ValidateItemStep<'a> {
    pub validator: &'a ContentValidator,
    pub candidate: &'a CandidateItem,
    pub request: &'a GenerationRequest,
    pub plan: &'a TopicPlan,
    pub context: &'a RetrievedContext,
}

#[async_trait]
impl<'a> Step for ValidateItemStep<'a> {
    type Output = ValidationResult;

    fn kind(&self) -> StepKind {
        StepKind::ValidateItem
    }

    async fn run(&self, ctx: &GenerationCtx) -> AppResult<ValidationResult> {
        self.validator
            .validate(
                self.candidate,
                self.request,
                self.plan,
                self.context,
                &ctx.to_string(),
            )
            .await
    }
}

pub struct GenerateVisualStep<'a> {
    pub generator: &'a VisualGenerator,
    pub item: &'a CandidateItem,
    pub context: &'a RetrievedContext,
    pub feedback: &'a [String],
}

#[async_trait]
impl<'a> Step for GenerateVisualStep<'a> {
    type Output = VisualArtifact;

    fn kind(&self) -> StepKind {
        StepKind::GenerateVisual
    }

    async fn run(&self, _ctx: &GenerationCtx) -> AppResult<VisualArtifact> {
        self.generator
            .generate(self.item, self.context, self.feedback)
            .await
    }
}

pub struct ValidateVisualStep<'a> {
    pub validator: &'a VisualValidator,
    pub item: &'a CandidateItem,
    pub visual: &'a VisualArtifact,
}

#[async_trait]
impl<'a> Step for ValidateVisualStep<'a> {
    type Output = ValidationResult;

    fn kind(&self) -> StepKind {
        StepKind::ValidateVisual
    }

    async fn run(&self, ctx: &GenerationCtx) -> AppResult<ValidationResult> {
        self.validator
            .validate(self.item, self.visual, &ctx.to_string())
            .await
    }
}
