//! The [`BikeSearcher`] facade.
//!
//! ```rust,no_run
//! use bikewatch::{BikeSearcher, RawSearchParams, SearchConfig, StaticGeocoder};
//! use bikewatch::data::RegistryData;
//!
//! # async fn run() -> bikewatch::error::Result<()> {
//! let registry = RegistryData::from_default_dir()?;
//! let searcher = BikeSearcher::new(registry, StaticGeocoder::new(), SearchConfig::default())?;
//!
//! let params = RawSearchParams::from_json(r#"{"serial": "WTU 555", "stolenness": "all"}"#)
//!     .map_err(anyhow::Error::from)?;
//! let criteria = searcher.interpret(&params, None).await;
//! let exact = searcher.search(&criteria)?;
//! let close = searcher.search_close_serials(&criteria)?;
//! println!("{} exact, {} close", exact.height(), close.height());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use bikewatch_data::{RegistryData, RegistryMetadata};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    config::SearchConfig,
    error::Result,
    interpret::{QueryInterpreter, RawSearchParams, SearchCriteria},
    proximity::{Geocoder, ProximityResolver},
    reference::{AutocompleteOption, ReferenceTag, ReferenceTables},
    search::AssetStore,
};

/// Entry of the search box's initial selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryItemOption {
    /// Free-text query, shown as typed.
    Query(String),
    Reference(AutocompleteOption),
}

/// Registry, reference tables, text index and geocoder behind one handle.
///
/// All state is read-only after construction; share it across requests.
#[derive(Debug, Clone)]
pub struct BikeSearcher<G> {
    store: AssetStore,
    references: ReferenceTables,
    proximity: ProximityResolver<G>,
    metadata: RegistryMetadata,
    config: SearchConfig,
}

impl<G: Geocoder> BikeSearcher<G> {
    #[instrument(name = "Initialize BikeSearcher", skip_all, level = "info")]
    pub fn new(registry: RegistryData, geocoder: G, config: SearchConfig) -> Result<Self> {
        let t_init = std::time::Instant::now();
        let references = ReferenceTables::from_registry(&registry);
        let store = AssetStore::new(
            registry.assets,
            config.index_memory_budget,
            config.parallel_threshold,
        )?;
        info!(
            elapsed_seconds = ?t_init.elapsed(),
            source = %registry.metadata.source,
            "BikeSearcher initialization complete"
        );
        Ok(Self {
            store,
            references,
            proximity: ProximityResolver::new(geocoder, config.geocode_timeout),
            metadata: registry.metadata,
            config,
        })
    }

    /// Load the registry files from `dir` (see [`RegistryData::from_dir`]).
    pub fn from_dir(dir: &Path, geocoder: G, config: SearchConfig) -> Result<Self> {
        Self::new(RegistryData::from_dir(dir)?, geocoder, config)
    }

    /// Load the registry from the resolved data directory.
    pub fn from_default_dir(geocoder: G, config: SearchConfig) -> Result<Self> {
        Self::new(RegistryData::from_default_dir()?, geocoder, config)
    }

    /// Turn raw request parameters into criteria. Never fails; see
    /// [`QueryInterpreter`].
    pub async fn interpret(
        &self,
        params: &RawSearchParams,
        client_ip: Option<&str>,
    ) -> SearchCriteria {
        QueryInterpreter::new(&self.references, &self.proximity)
            .interpret(params, client_ip)
            .await
    }

    /// Exact matches, sorted by id.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        Ok(self.store.search(criteria)?)
    }

    /// Serials within the edit distance limit that are neither exact nor
    /// containing matches. Empty without a serial.
    pub fn search_close_serials(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        Ok(self.store.near_matches(criteria)?)
    }

    /// Serials containing the query serial, exact matches excluded. Empty without
    /// a serial.
    pub fn search_serials_containing(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        Ok(self.store.containing_matches(criteria)?)
    }

    /// Options that reproduce `criteria` in the search box: the query, then each
    /// known manufacturer, then each known color. Unknown ids are skipped.
    #[must_use]
    pub fn selected_query_items_options(&self, criteria: &SearchCriteria) -> Vec<QueryItemOption> {
        let query = criteria.query.iter().cloned().map(QueryItemOption::Query);
        let manufacturers = criteria
            .manufacturer
            .iter()
            .flat_map(|m| m.ids().iter().copied())
            .map(|id| (ReferenceTag::Manufacturer, id));
        let colors = criteria
            .colors
            .iter()
            .flatten()
            .map(|&id| (ReferenceTag::Color, id));

        query
            .chain(
                manufacturers
                    .chain(colors)
                    .filter_map(|(tag, id)| self.references.autocomplete_option(tag, id))
                    .map(QueryItemOption::Reference),
            )
            .collect()
    }

    #[must_use]
    pub fn references(&self) -> &ReferenceTables {
        &self.references
    }

    #[must_use]
    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn info(&self) -> Result<SearcherInfo> {
        Ok(SearcherInfo {
            metadata: self.metadata.clone(),
            total_assets: self.store.assets().len(),
            indexed_assets: self.store.index().num_docs()?,
        })
    }
}

#[cfg(feature = "http-geocoder")]
impl BikeSearcher<crate::proximity::HttpGeocoder> {
    /// Searcher geocoding against the public Nominatim and ip-api services.
    pub fn with_http_geocoder(registry: RegistryData, config: SearchConfig) -> Result<Self> {
        Self::new(registry, crate::proximity::HttpGeocoder::new()?, config)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearcherInfo {
    pub metadata: RegistryMetadata,
    pub total_assets: usize,
    pub indexed_assets: u64,
}

impl SearcherInfo {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} assets from {} ({} indexed), {} manufacturers, {} colors",
            self.total_assets,
            self.metadata.source,
            self.indexed_assets,
            self.metadata.manufacturer_count,
            self.metadata.color_count
        )
    }
}
