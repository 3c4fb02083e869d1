//! Edit-distance filtering of candidate serials.

use bikewatch_data::columns;
use polars::prelude::*;
use rapidfuzz::distance::levenshtein;
use rayon::prelude::*;
use tracing::debug;

use super::Result;

/// Near matches lie strictly closer than this many edits.
pub const EDIT_DISTANCE_LIMIT: usize = 3;

#[must_use]
pub fn is_near_serial(candidate: &str, serial: &str) -> bool {
    levenshtein::distance(candidate.chars(), serial.chars()) < EDIT_DISTANCE_LIMIT
}

/// Keep the rows of `candidates` whose normalized serial is a near match for
/// `serial`. Distances are computed in parallel once there are at least
/// `parallel_threshold` candidates.
pub fn retain_near_serials(
    candidates: &DataFrame,
    serial: &str,
    parallel_threshold: usize,
) -> Result<DataFrame> {
    let serials = candidates
        .column(columns::SERIAL_NORMALIZED)?
        .str()?
        .into_iter()
        .collect::<Vec<_>>();

    let keep = |candidate: &Option<&str>| candidate.is_some_and(|c| is_near_serial(c, serial));
    let mask: Vec<bool> = if serials.len() >= parallel_threshold {
        serials.par_iter().map(keep).collect()
    } else {
        serials.iter().map(keep).collect()
    };
    debug!(
        candidates = serials.len(),
        parallel = serials.len() >= parallel_threshold,
        "Computed serial edit distances"
    );

    Ok(candidates.filter(&BooleanChunked::new("near".into(), mask))?)
}
