pub mod base;
pub mod logging;
pub mod player;
pub mod storage;

pub use base::*;
pub use logging::*;
pub use player::*;
pub use storage::*;
