mod names;
mod vehicle;

pub use names::{lookup_customers, lookup_farms, lookup_products};
pub use vehicle::lookup_vehicle;
