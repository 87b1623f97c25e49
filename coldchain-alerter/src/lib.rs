pub mod alert;
pub mod handlers;
pub mod startup;
