//! 基础设施层：外部模型服务的接入

pub mod completion_provider;
pub mod mock_provider;
pub mod openai_provider;

pub use completion_provider::{CompletionProvider, Message, Role};
pub use mock_provider::{MockFailure, MockProvider, RecordedCall};
pub use openai_provider::OpenAiProvider;
