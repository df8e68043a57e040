pub mod cache;
pub mod error;
pub mod params;
pub mod renderer;
pub mod store;

pub use cache::TemplateCache;
pub use error::TemplateError;
pub use params::{ParamBag, ResolverContext, ResolverHook, ResolverRegistry};
pub use renderer::TemplateRenderer;
pub use store::{FilePromptStore, PromptStore, StaticPromptStore, TemplateReference};
