// Domain entities
pub mod event;
pub mod notification;
pub mod registration;
pub mod retry_counter;
pub mod runtime_config;

pub use event::*;
pub use notification::*;
pub use registration::*;
pub use retry_counter::*;
pub use runtime_config::*;
