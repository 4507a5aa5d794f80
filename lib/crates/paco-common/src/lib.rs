pub mod report;
pub mod types;

pub use report::*;
pub use types::*;
