pub mod anthropic;
pub mod gateway;
pub mod mock;
pub mod model_router;
pub mod openai_compat;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use gateway::{ProviderGateway, ProviderSlot};
pub use mock::MockProvider;
pub use model_router::ModelRouter;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, ProviderError, Role};
