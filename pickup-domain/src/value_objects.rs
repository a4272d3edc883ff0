// Domain value objects
pub mod identifiers;
pub mod status;

pub use identifiers::*;
pub use status::*;
