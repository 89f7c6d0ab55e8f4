/// Per-well aggregation of yearly heads and the join with the lookup table.
///
/// Both steps are keyed explicitly by `id_gerbil`. Output is always in
/// ascending id order so repeated runs produce identical files.

use std::collections::BTreeMap;

use crate::lithology::LITHO_UNDEFINED;
use crate::model::{HeadAggregate, LookupRecord, WellSummary, YearlyHead};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JoinError {
    /// The lookup table holds two different rows for the same well.
    #[error("conflicting lookup rows for well {id}")]
    ConflictingLookup { id: i64 },
}

/// Result of joining aggregates with lookup rows.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub wells: Vec<WellSummary>,
    /// Wells with yearly heads but no lookup row.
    pub unmatched_aggregates: usize,
    /// Lookup rows with no yearly heads.
    pub unmatched_lookups: usize,
}

#[derive(Default)]
struct Accumulator {
    head_sum_cm: f64,
    heads: u32,
    years: u32,
}

/// Collapses yearly heads to one row per well.
///
/// `n_years` counts every yearly record. The mean uses only non-null heads,
/// is rounded to whole centimetres (ties to even) and converted to metres.
pub fn aggregate_heads(rows: &[YearlyHead]) -> Vec<HeadAggregate> {
    let mut by_well: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for row in rows {
        let acc = by_well.entry(row.id_gerbil).or_default();
        acc.years += 1;
        if let Some(head) = row.gw_head_cm.filter(|h| h.is_finite()) {
            acc.head_sum_cm += head;
            acc.heads += 1;
        }
    }

    by_well
        .into_iter()
        .map(|(id_gerbil, acc)| HeadAggregate {
            id_gerbil,
            mean_gwh_m: (acc.heads > 0)
                .then(|| (acc.head_sum_cm / f64::from(acc.heads)).round_ties_even() / 100.0),
            n_years: acc.years,
        })
        .collect()
}

/// Inner join of aggregates and lookup rows on `id_gerbil`.
///
/// Identical duplicate lookup rows collapse to one. Two different rows for
/// the same id are an error rather than a silent fan-out.
pub fn join_with_lookup(
    aggregates: &[HeadAggregate],
    lookups: &[LookupRecord],
) -> Result<JoinOutcome, JoinError> {
    let mut lookup_by_id: BTreeMap<i64, &LookupRecord> = BTreeMap::new();
    for record in lookups {
        if let Some(existing) = lookup_by_id.insert(record.id_gerbil, record) {
            if existing != record {
                return Err(JoinError::ConflictingLookup {
                    id: record.id_gerbil,
                });
            }
        }
    }

    let mut wells = Vec::with_capacity(aggregates.len());
    let mut unmatched_aggregates = 0;

    for agg in aggregates {
        let Some(lookup) = lookup_by_id.get(&agg.id_gerbil) else {
            unmatched_aggregates += 1;
            continue;
        };
        wells.push(WellSummary {
            id_gerbil: agg.id_gerbil,
            id_orig_src: lookup.id_orig_src.clone(),
            x_wgs84: lookup.x_wgs84,
            y_wgs84: lookup.y_wgs84,
            orig_elev_m_asl: lookup.orig_elev_m_asl,
            glo90_elev_m_asl: lookup.glo90_elev_m_asl,
            mean_gwh_m: agg.mean_gwh_m,
            n_years: agg.n_years,
            glim_raw: None,
            litho_class: LITHO_UNDEFINED,
        });
    }

    wells.sort_by_key(|w| w.id_gerbil);
    let unmatched_lookups = lookup_by_id.len() - wells.len();

    Ok(JoinOutcome {
        wells,
        unmatched_aggregates,
        unmatched_lookups,
    })
}
