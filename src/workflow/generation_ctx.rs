//! 生成上下文
//!
//! 封装"我正在为哪个请求生成第几轮"这一信息，只用于日志前缀

use std::fmt::Display;

use uuid::Uuid;

use crate::models::GenerationRequest;

/// 一次生成运行的上下文
#[derive(Debug, Clone)]
pub struct GenerationCtx {
    /// 运行 ID（取 UUID 前 8 位）
    pub run_id: String,

    /// 请求描述，例如 `math/geometry-and-trigonometry/Circles (easy)`
    pub label: String,

    /// 当前轮次（从 1 开始，0 表示尚未进入循环）
    pub iteration: u32,
}

impl GenerationCtx {
    pub fn new(request: &GenerationRequest) -> Self {
        let mut run_id = Uuid::new_v4().simple().to_string();
        run_id.truncate(8);
        Self {
            run_id,
            label: request.label(),
            iteration: 0,
        }
    }

    /// 带轮次的日志前缀
    pub fn at(&self, iteration: u32) -> Self {
        Self {
            iteration,
            ..self.clone()
        }
    }
}

impl Display for GenerationCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.iteration == 0 {
            write!(f, "[生成 {}]", self.run_id)
        } else {
            write!(f, "[生成 {} 第{}轮]", self.run_id, self.iteration)
        }
    }
}
