pub mod auth;
pub mod client;
pub mod parser;
pub mod rate_limiter;
