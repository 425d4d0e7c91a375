use serde::{Deserialize, Serialize};

/// 迭代策略：所有"生成 → 校验"循环共用同一份
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// 目标分
    pub target_score: f64,
    /// 保底分（最后一轮可接受）
    pub floor_score: f64,
    /// 最大迭代次数
    pub max_iterations: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            target_score: 0.8,
            floor_score: 0.7,
            max_iterations: 3,
        }
    }
}

/// 单轮结束后的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 达到目标分
    Accept,
    /// 继续下一轮
    Retry,
    /// 预算已用完
    Exhausted,
}

impl RetryPolicy {
    /// 根据本轮结果决定下一步（iteration 从 1 开始）
    pub fn decide(&self, is_valid: bool, score: f64, iteration: u32) -> Decision {
        if is_valid && score >= self.target_score {
            Decision::Accept
        } else if iteration >= self.max_iterations {
            Decision::Exhausted
        } else {
            Decision::Retry
        }
    }

    /// 预算耗尽后，最佳候选是否达到保底分
    pub fn clears_floor(&self, score: f64) -> bool {
        score >= self.floor_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_only_when_valid_and_on_target() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(true, 0.85, 1), Decision::Accept);
        assert_eq!(policy.decide(false, 0.85, 1), Decision::Retry);
        assert_eq!(policy.decide(true, 0.75, 2), Decision::Retry);
    }

    #[test]
    fn test_final_iteration_exhausts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(false, 0.75, 3), Decision::Exhausted);
        assert!(policy.clears_floor(0.75));
        assert!(!policy.clears_floor(0.65));
    }
}
