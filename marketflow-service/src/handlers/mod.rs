mod availability;
mod forecast;
mod order;
mod prices;

pub use availability::check_product_availability;
pub use forecast::get_demand_forecast;
pub use order::place_purchase_order;
pub use prices::get_market_prices;
