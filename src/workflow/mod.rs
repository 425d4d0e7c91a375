//! 流程层：定义一道题从请求到结果的处理顺序

pub mod generation_ctx;
pub mod generation_flow;
pub mod step;

pub use generation_ctx::GenerationCtx;
pub use generation_flow::{GenerationFlow, ItemGenerator};
pub use step::{Step, StepKind};
