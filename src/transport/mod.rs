pub mod chat;
pub mod resolver;
pub mod voice;

pub use chat::*;
pub use resolver::*;
pub use voice::*;
