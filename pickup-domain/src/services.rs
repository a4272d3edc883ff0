pub mod failure_accountant;
pub mod reconciler;
pub mod registration_policy;
pub mod store_merge;

pub use failure_accountant::*;
pub use reconciler::*;
pub use registration_policy::*;
pub use store_merge::*;
