pub mod cache;
pub mod clock;
pub mod pms;
pub mod rates;
pub mod sqlite;
