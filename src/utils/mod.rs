pub mod constants;
pub mod helpers;
pub mod logger;

pub use constants::*;
pub use helpers::*;
