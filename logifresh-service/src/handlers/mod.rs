mod cold_chain;
mod pickup_request;
mod route;
mod shipment;
mod stock;

pub use cold_chain::report_cold_chain_reading;
pub use pickup_request::acknowledge_pickup_request;
pub use route::optimize_delivery_route;
pub use shipment::track_shipment;
pub use stock::check_warehouse_stock;
