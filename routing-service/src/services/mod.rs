pub mod maps;

pub use maps::{LatLng, MapsClient, MapsError, Route, RouteLeg, RoutesResponse, parse_duration_secs};
