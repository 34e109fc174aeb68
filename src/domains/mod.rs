pub mod booking;
pub mod catalog;
pub mod core;
pub mod customer;
pub mod feedback;
pub mod settings;
pub mod staff;
pub mod sync;
pub mod transaction;
