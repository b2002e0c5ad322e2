pub mod employee;
pub mod event;
pub mod makeup;
pub mod summary;
