//! Raw request parameters to [`SearchCriteria`].
//!
//! Interpretation never fails. Unresolvable references are dropped, malformed
//! values are ignored and a proximity request that cannot be geocoded falls back
//! to the default stolenness category.

use tracing::{debug, instrument};

pub use criteria::{ManufacturerFilter, SearchCriteria, Stolenness};
pub use params::{DistanceParam, OneOrMany, PERMITTED_SEARCH_PARAMS, RawSearchParams};
pub use tokens::{QueryToken, TokenizedQuery};

use crate::{
    proximity::{Geocoder, ProximityResolver},
    reference::ReferenceTables,
};

mod criteria;
mod params;
mod tokens;

const PROXIMITY: &str = "proximity";

/// Borrows the read-only collaborators for the duration of one request.
#[derive(Debug, Clone, Copy)]
pub struct QueryInterpreter<'a, G> {
    references: &'a ReferenceTables,
    proximity: &'a ProximityResolver<G>,
}

impl<'a, G: Geocoder> QueryInterpreter<'a, G> {
    pub fn new(references: &'a ReferenceTables, proximity: &'a ProximityResolver<G>) -> Self {
        Self {
            references,
            proximity,
        }
    }

    #[instrument(name = "Interpret search params", skip_all, level = "debug")]
    pub async fn interpret(
        &self,
        params: &RawSearchParams,
        client_ip: Option<&str>,
    ) -> SearchCriteria {
        let mut criteria = SearchCriteria::default();

        if let Some(raw) = params.serial.as_deref().filter(|s| !s.trim().is_empty()) {
            criteria = criteria.with_serial(raw);
        }

        let tokens = TokenizedQuery::from_items(params.query_items());

        // An explicit query wins over the untagged items
        criteria.query = params
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .or(tokens.text);

        let manufacturers = params
            .manufacturer_references()
            .unwrap_or(tokens.manufacturers);
        criteria = criteria
            .with_manufacturers(self.references.manufacturers.resolve_all(&manufacturers));

        let colors = params.color_references().unwrap_or(tokens.colors);
        criteria = criteria.with_colors(self.references.colors.resolve_all(&colors));

        criteria = self.interpret_stolenness(criteria, params, client_ip).await;

        debug!(?criteria, "Interpreted search criteria");
        criteria
    }

    async fn interpret_stolenness(
        &self,
        criteria: SearchCriteria,
        params: &RawSearchParams,
        client_ip: Option<&str>,
    ) -> SearchCriteria {
        let requested = params.stolenness.as_deref().map(str::trim);
        if let Some(explicit) = requested.and_then(Stolenness::parse_explicit) {
            return criteria.with_stolenness(explicit);
        }
        if !requested.is_some_and(|r| r.eq_ignore_ascii_case(PROXIMITY)) {
            return criteria.with_stolenness(Stolenness::Stolen);
        }

        match self
            .proximity
            .resolve(params.location.as_deref(), params.distance(), client_ip)
            .await
        {
            Ok(proximity) => criteria.with_proximity(proximity),
            Err(reason) => {
                debug!(%reason, "No proximity result, searching stolen bikes");
                criteria.with_stolenness(Stolenness::Stolen)
            }
        }
    }
}
