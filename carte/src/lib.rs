pub mod collect;
pub mod commons;
pub mod geo_core;
pub mod geometric;
pub mod pipeline;

pub use collect::feed::episodes::{Episode, EpisodeFeedReader, FeedOutcome};
pub use collect::nominatim::city_resolver::{CityResolver, PlaceCandidate, SearchOutcome};
pub use commons::config::MapConfig;
pub use commons::error::CarteError;
pub use geo_core::{BoundingBox, GeoCore};
pub use pipeline::{MapPipeline, RenderedMap};
