pub mod availability;
pub mod booking;
pub mod calendar;
pub mod dates;
pub mod events;
pub mod intelligence;
pub mod money;
pub mod property;
pub mod quote;
pub mod reservation;
