//! Criteria to filter predicates, and predicates to polars expressions.

use bikewatch_data::{AssetStatus, columns};
use polars::prelude::*;
use tracing::trace;

use super::Result;
use crate::{
    index::AssetIndex,
    interpret::{SearchCriteria, Stolenness},
    proximity::BoundingBox,
};

/// One filter over the asset registry. Absent criteria produce no predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Normalized serial equals the value.
    SerialEquals(String),
    ManufacturerIn(Vec<u32>),
    /// Any of the three color slots holds any of the ids.
    AnyColorIn(Vec<u32>),
    StatusIn(Vec<AssetStatus>),
    /// Last known coordinates inside the box.
    Within(BoundingBox),
    /// Every term matches the text index.
    FullText(String),
}

fn id_list<T>(name: &str, ids: &[T]) -> Expr
where
    Series: NamedFrom<Vec<T>, [T]>,
    T: Clone,
{
    lit(Series::new(name.into(), ids.to_vec())).implode()
}

impl Predicate {
    pub fn to_expr(&self, index: &AssetIndex) -> Result<Expr> {
        let expr = match self {
            Self::SerialEquals(serial) => col(columns::SERIAL_NORMALIZED).eq(lit(serial.clone())),
            Self::ManufacturerIn(ids) => {
                col(columns::MANUFACTURER_ID).is_in(id_list("manufacturer_ids", ids), false)
            }
            Self::AnyColorIn(ids) => {
                let wanted = id_list("color_ids", ids);
                columns::COLOR_SLOTS
                    .into_iter()
                    .map(|slot| col(slot).is_in(wanted.clone(), false))
                    .reduce(Expr::or)
                    .unwrap_or_else(|| lit(false))
            }
            Self::StatusIn(statuses) => {
                let names = statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>();
                col(columns::STATUS).is_in(
                    lit(Series::new("statuses".into(), names)).implode(),
                    false,
                )
            }
            Self::Within(bbox) => within_expr(bbox),
            Self::FullText(query) => {
                let ids = index.matching_ids(query)?;
                trace!(query, matches = ids.len(), "Text query resolved to ids");
                col(columns::ID).is_in(id_list("text_match_ids", &ids), false)
            }
        };
        Ok(expr)
    }
}

fn within_expr(bbox: &BoundingBox) -> Expr {
    let lat = col(columns::LATITUDE);
    let lon = col(columns::LONGITUDE);
    let in_lat = lat.clone().gt_eq(lit(bbox.south)).and(lat.lt_eq(lit(bbox.north)));
    let east_of_west = lon.clone().gt_eq(lit(bbox.west));
    let west_of_east = lon.lt_eq(lit(bbox.east));
    let in_lon = if bbox.crosses_antimeridian() {
        east_of_west.or(west_of_east)
    } else {
        east_of_west.and(west_of_east)
    };
    in_lat.and(in_lon)
}

fn stolenness_predicates(criteria: &SearchCriteria) -> Vec<Predicate> {
    match criteria.stolenness {
        Stolenness::All => vec![],
        Stolenness::Non => vec![Predicate::StatusIn(vec![AssetStatus::WithOwner])],
        Stolenness::Found => vec![Predicate::StatusIn(vec![AssetStatus::Impounded])],
        Stolenness::Stolen => vec![Predicate::StatusIn(AssetStatus::STOLEN_OR_IMPOUNDED.to_vec())],
        Stolenness::Proximity => {
            let mut predicates =
                vec![Predicate::StatusIn(AssetStatus::STOLEN_OR_IMPOUNDED.to_vec())];
            predicates.extend(criteria.bounding_box().copied().map(Predicate::Within));
            predicates
        }
    }
}

/// Conjunction of predicates, most selective first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateChain {
    predicates: Vec<Predicate>,
}

impl PredicateChain {
    /// Every predicate the criteria call for, serial included.
    #[must_use]
    pub fn compose(criteria: &SearchCriteria) -> Self {
        let mut chain = Self::non_serial(criteria);
        if let Some(serial) = &criteria.serial {
            chain
                .predicates
                .insert(0, Predicate::SerialEquals(serial.clone()));
        }
        chain
    }

    /// Manufacturer, colors, stolenness and text; the serial is left out.
    #[must_use]
    pub fn non_serial(criteria: &SearchCriteria) -> Self {
        let mut predicates = Vec::new();
        if let Some(manufacturer) = &criteria.manufacturer {
            predicates.push(Predicate::ManufacturerIn(manufacturer.ids().to_vec()));
        }
        if let Some(colors) = criteria.colors.as_ref().filter(|c| !c.is_empty()) {
            predicates.push(Predicate::AnyColorIn(colors.clone()));
        }
        predicates.extend(stolenness_predicates(criteria));
        if let Some(query) = criteria.query.as_deref().filter(|q| !q.trim().is_empty()) {
            predicates.push(Predicate::FullText(query.to_string()));
        }
        Self { predicates }
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The chain as one boolean expression; `true` when the chain is empty.
    pub fn to_expr(&self, index: &AssetIndex) -> Result<Expr> {
        let mut combined: Option<Expr> = None;
        for predicate in &self.predicates {
            let expr = predicate.to_expr(index)?;
            combined = Some(match combined {
                Some(acc) => acc.and(expr),
                None => expr,
            });
        }
        Ok(combined.unwrap_or_else(|| lit(true)))
    }
}
