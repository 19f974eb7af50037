pub mod cache;
pub mod clock;
pub mod pms_client;
pub mod rate_source;
pub mod store;
