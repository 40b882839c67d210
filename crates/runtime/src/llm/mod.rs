pub mod types;

pub use types::{GenerationParameters, GenerationResult, Message, Role, TaskType, Usage};
