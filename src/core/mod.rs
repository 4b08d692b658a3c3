//! 核心层：错误分类、项目状态投影、生成监管

pub mod error;
pub mod state;
pub mod supervisor;

pub use error::NovelError;
pub use state::ProjectStatus;
pub use supervisor::{GenerationSupervisor, InFlightGuard};
