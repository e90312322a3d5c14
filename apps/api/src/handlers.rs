pub mod admin;
pub mod bookings;
pub mod fleet;
pub mod health;
pub mod me;
pub mod payments;
pub mod uploads;
