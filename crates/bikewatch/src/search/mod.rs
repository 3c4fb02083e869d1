//! Running criteria against the asset registry.
//!
//! Three result tiers are kept mutually exclusive: exact serial matches, serials
//! containing the query serial, and near serials (within the edit distance
//! limit). Containing and near matches never repeat an exact match, and near
//! matches never repeat a containing match.

use bikewatch_data::{AssetData, columns};
pub use error::SearchError;
use polars::prelude::*;
use tracing::{debug, instrument};

pub use fuzzy::{EDIT_DISTANCE_LIMIT, is_near_serial};
pub use predicate::{Predicate, PredicateChain};

use crate::{
    index::{AssetIndex, AssetIndexDef, FTSIndex},
    interpret::SearchCriteria,
};

mod fuzzy;
mod predicate;

type Result<T> = std::result::Result<T, SearchError>;

/// Ids of a result frame in row order.
pub fn result_ids(df: &DataFrame) -> Result<Vec<u64>> {
    Ok(df
        .column(columns::ID)?
        .u64()?
        .into_iter()
        .flatten()
        .collect())
}

/// The registry together with its text index.
#[derive(Debug, Clone)]
pub struct AssetStore {
    assets: AssetData,
    index: AssetIndex,
    parallel_threshold: usize,
}

impl AssetStore {
    #[instrument(name = "Build asset store", skip(assets), fields(source = assets.source_name()))]
    pub fn new(assets: AssetData, memory_budget: usize, parallel_threshold: usize) -> Result<Self> {
        let index = FTSIndex::new(AssetIndexDef, assets.lazy(), memory_budget)?;
        Ok(Self {
            assets,
            index,
            parallel_threshold,
        })
    }

    #[must_use]
    pub fn assets(&self) -> &AssetData {
        &self.assets
    }

    #[must_use]
    pub fn index(&self) -> &AssetIndex {
        &self.index
    }

    /// Registry rows passing every predicate of `chain`.
    pub fn filtered(&self, chain: &PredicateChain) -> Result<LazyFrame> {
        debug!(predicates = ?chain.predicates(), "Applying predicate chain");
        Ok(self.assets.lazy().filter(chain.to_expr(&self.index)?))
    }

    /// Non-serial matches that are not exact matches, split into serials that
    /// contain `serial` and the rest.
    ///
    /// The text query is resolved against the index once for both.
    fn serial_tiers(&self, criteria: &SearchCriteria, serial: &str) -> Result<SerialTiers> {
        let chain = PredicateChain::non_serial(criteria);
        debug!(predicates = ?chain.predicates(), serial, "Splitting serial tiers");
        let not_exact = chain.to_expr(&self.index)?.and(
            col(columns::SERIAL_NORMALIZED)
                .eq(lit(serial.to_string()))
                .not(),
        );
        let contains = col(columns::SERIAL_NORMALIZED)
            .str()
            .contains_literal(lit(serial.to_string()));
        Ok(SerialTiers {
            containing: self.assets.lazy().filter(not_exact.clone().and(contains.clone())),
            rest: self.assets.lazy().filter(not_exact.and(contains.not())),
        })
    }

    fn empty(&self) -> DataFrame {
        self.assets.frame().clear()
    }

    fn collect_sorted(lf: LazyFrame) -> Result<DataFrame> {
        Ok(lf
            .sort([columns::ID], SortMultipleOptions::default())
            .collect()?)
    }

    /// Exact matches: serial equality plus every other predicate.
    #[instrument(name = "Search", skip_all, level = "debug")]
    pub fn search(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        let results = Self::collect_sorted(self.filtered(&PredicateChain::compose(criteria))?)?;
        debug!(num_results = results.height(), "Exact search complete");
        Ok(results)
    }

    /// Non-exact matches whose serial contains the query serial.
    #[instrument(name = "Search serials containing", skip_all, level = "debug")]
    pub fn containing_matches(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        let Some(serial) = criteria.serial.as_deref() else {
            return Ok(self.empty());
        };
        let results = Self::collect_sorted(self.serial_tiers(criteria, serial)?.containing)?;
        debug!(num_results = results.height(), "Containing search complete");
        Ok(results)
    }

    /// Non-exact, non-containing matches within the edit distance limit.
    ///
    /// Only the candidates left after the other predicates are compared.
    #[instrument(name = "Search close serials", skip_all, level = "debug")]
    pub fn near_matches(&self, criteria: &SearchCriteria) -> Result<DataFrame> {
        let Some(serial) = criteria.serial.as_deref() else {
            return Ok(self.empty());
        };
        let candidates = Self::collect_sorted(self.serial_tiers(criteria, serial)?.rest)?;
        let results = fuzzy::retain_near_serials(&candidates, serial, self.parallel_threshold)?;
        debug!(
            candidates = candidates.height(),
            num_results = results.height(),
            "Close serial search complete"
        );
        Ok(results)
    }
}

/// The two serial tiers below exact matches, as lazy plans.
struct SerialTiers {
    containing: LazyFrame,
    /// Neither exact nor containing; near-match candidates.
    rest: LazyFrame,
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error("Index error: {0}")]
        Index(#[from] crate::index::IndexError),
    }
}
