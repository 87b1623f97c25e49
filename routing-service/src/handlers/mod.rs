mod delivery;

pub use delivery::plan_delivery_route;
