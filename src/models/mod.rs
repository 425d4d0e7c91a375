pub mod candidate;
pub mod context;
pub mod loaders;
pub mod request;
pub mod result;
pub mod retry_policy;
pub mod session;
pub mod topic;
pub mod validation;
pub mod visual;

pub use candidate::{CandidateItem, ChoiceLabel};
pub use context::{RetrievedContext, WorkedExample};
pub use loaders::{load_context_library, ContextEntry, ContextLibrary};
pub use request::{Difficulty, GenerationRequest, Section};
pub use result::{GeneratedResult, GenerationMetadata};
pub use retry_policy::{Decision, RetryPolicy};
pub use session::{
    Module2Mix, Performance, QuestionSelection, SessionBlueprint, SessionPhase, SessionQuestion,
    SessionState, TestSession,
};
pub use topic::{find_leaf, SubtopicLeaf, Topic, TopicPlan};
pub use validation::{Issue, IssueCategory, Severity, TopicCheck, ValidationBuilder, ValidationResult};
pub use visual::{VisualArtifact, VisualKind};
