mod advice;
mod farm_issue;
mod harvest;
mod pickup;

pub use advice::get_harvest_advice;
pub use farm_issue::report_farm_issue;
pub use harvest::log_harvest;
pub use pickup::schedule_pickup;
