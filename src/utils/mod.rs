pub mod json;
pub mod logger;
