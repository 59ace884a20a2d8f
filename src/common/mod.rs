pub mod errors;
pub mod fmt;
pub mod logger;
pub mod types;
