//! Bikewatch - search core for a registry of bicycles
//!
//! Turns noisy, partial search input (hand-typed or OCR'd serial numbers, color and
//! manufacturer names, theft status, "near me") into typed [`SearchCriteria`], composes
//! the criteria into filters over the asset registry, and expands serial searches
//! with containing and near (edit distance) matches.
//!
//! # Quick Start
//!
//! ```rust
//! use bikewatch::{BikeSearcher, RawSearchParams, SearchConfig, StaticGeocoder, Stolenness};
//! use bikewatch::data::{RegistryData, TestDataConfig, create_test_data_dir};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bikewatch::error::Result<()> {
//! let dir = create_test_data_dir(&TestDataConfig::minimal())?;
//! let registry = RegistryData::from_dir(dir.path())?;
//! let searcher = BikeSearcher::new(registry, StaticGeocoder::new(), SearchConfig::default())?;
//!
//! let params = RawSearchParams {
//!     query_items: Some(bikewatch::OneOrMany::Many(vec!["blue".into(), "c_2".into()])),
//!     ..Default::default()
//! };
//! let criteria = searcher.interpret(&params, None).await;
//! assert_eq!(criteria.stolenness, Stolenness::Stolen);
//!
//! let results = searcher.search(&criteria)?;
//! println!("{} stolen blue bikes", results.height());
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! Unresolvable manufacturers or colors are dropped, and a proximity search whose
//! location cannot be geocoded (or whose geocoder is slow) quietly falls back to
//! searching stolen bikes. Only failures of the registry itself surface as errors.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod index;
mod interpret;
mod proximity;
mod reference;
mod search;
mod serial;

pub use crate::core::{BikeSearcher, QueryItemOption, SearcherInfo};

pub use bikewatch_data as data;
pub use config::{SearchConfig, SearchConfigBuilder};
pub use index::{AssetIndex, AssetIndexDef, FTSIndex, IndexDefinition, IndexError};
pub use interpret::{
    DistanceParam, ManufacturerFilter, OneOrMany, PERMITTED_SEARCH_PARAMS, QueryInterpreter,
    QueryToken, RawSearchParams, SearchCriteria, Stolenness, TokenizedQuery,
};
pub use polars;
#[cfg(feature = "http-geocoder")]
pub use proximity::HttpGeocoder;
pub use proximity::{
    BoundingBox, Coordinates, DEFAULT_DISTANCE_MILES, GeocodeError, GeocodedPlace, Geocoder,
    ProximityMatch, ProximityResolver, SoftFailure, StaticGeocoder, effective_distance,
};
pub use reference::{
    AutocompleteOption, Color, Manufacturer, ReferenceInput, ReferenceKind, ReferenceTable,
    ReferenceTables, ReferenceTag,
};
pub use search::{
    AssetStore, EDIT_DISTANCE_LIMIT, Predicate, PredicateChain, SearchError, is_near_serial,
    result_ids,
};
pub use serial::{SerialNumber, normalize_serial};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for bikewatch.
///
/// Installs a `tracing` fmt subscriber once per process. `RUST_LOG` takes
/// precedence over `level`; tantivy and the HTTP stack are capped at `warn`.
///
/// ```rust
/// use bikewatch::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), bikewatch::error::BikewatchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::BikewatchError> {
    LOGGER_INIT.get_or_try_init(|| {
        let mut filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?;
        for directive in ["tantivy=warn", "reqwest=warn", "hyper_util=warn"] {
            filter = filter.add_directive(directive.parse()?);
        }

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging(tracing::Level::WARN).is_ok());
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }
}
