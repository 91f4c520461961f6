pub mod feed;
pub mod global_variables;
pub mod nominatim;
pub mod tiles;
