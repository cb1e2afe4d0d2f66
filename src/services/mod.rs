pub mod booking;
pub mod catalog;
pub mod context;
pub mod scheduling;
