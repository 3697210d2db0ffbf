pub mod map_builder;
pub mod map_cache;
pub mod params;

pub use map_builder::{MapError, SimilarityMapBuilder, DEFAULT_CACHE_TTL};
pub use map_cache::{DisabledMapCache, InMemoryMapCache, MapCache};
pub use params::{cache_key, MapDefaults, MapQueryParams, MapScope, ParamsError, ResolvedMapParams};
