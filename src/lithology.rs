/// GLiM lithology registry and reclassification.
///
/// The GLiM world raster is sampled at each well and stores one numeric code
/// per lithology class. This module is the single source of truth for those
/// codes and for how they collapse into the coarse classes used downstream.

use crate::model::WellSummary;
use crate::raster::RasterSampler;

// ---------------------------------------------------------------------------
// Class metadata
// ---------------------------------------------------------------------------

/// One GLiM lithology class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LithologyClass {
    /// Short GLiM abbreviation.
    pub lith: &'static str,
    /// Full class name.
    pub lith_full: &'static str,
    /// Raster code.
    pub lith_num: i32,
}

/// Value used when a well has no usable lithology.
pub const LITHO_UNDEFINED: i32 = -1;

/// Every class in the reclassified GLiM raster, ordered by code.
pub static LITHOLOGY_REGISTRY: &[LithologyClass] = &[
    LithologyClass { lith: "nd", lith_full: "not defined", lith_num: 0 },
    LithologyClass { lith: "su", lith_full: "unconsolidated sediments", lith_num: 100 },
    LithologyClass { lith: "su_ad", lith_full: "alluvial deposits", lith_num: 101 },
    LithologyClass { lith: "su_ds", lith_full: "dune sands", lith_num: 102 },
    LithologyClass { lith: "su_lo", lith_full: "loess", lith_num: 103 },
    LithologyClass { lith: "su_mx", lith_full: "sand - mixed grain size", lith_num: 104 },
    LithologyClass { lith: "su_ss", lith_full: "sand - coarse grained", lith_num: 105 },
    LithologyClass { lith: "su_sh", lith_full: "sand - fine grained", lith_num: 106 },
    LithologyClass { lith: "su_cl", lith_full: "clay", lith_num: 107 },
    LithologyClass { lith: "su_gr", lith_full: "gravel", lith_num: 108 },
    LithologyClass { lith: "su_sl", lith_full: "silt", lith_num: 109 },
    LithologyClass { lith: "ss", lith_full: "siliclastic sedimentary rocks", lith_num: 200 },
    LithologyClass { lith: "sm", lith_full: "mixed sedimentary rocks", lith_num: 210 },
    LithologyClass { lith: "sc", lith_full: "carbonate sedimentary rocks", lith_num: 220 },
    LithologyClass { lith: "vb", lith_full: "basic volcanic rocks", lith_num: 300 },
    LithologyClass { lith: "vi", lith_full: "intermediate volcanic rocks", lith_num: 310 },
    LithologyClass { lith: "va", lith_full: "acid volcanic rocks", lith_num: 320 },
    LithologyClass { lith: "pb", lith_full: "basic plutonic rocks", lith_num: 400 },
    LithologyClass { lith: "pi", lith_full: "intermediate plutonic rocks", lith_num: 410 },
    LithologyClass { lith: "pa", lith_full: "acid plutonic rocks", lith_num: 420 },
    LithologyClass { lith: "mt", lith_full: "metamorphic rocks", lith_num: 500 },
    LithologyClass { lith: "py", lith_full: "pyroclastics", lith_num: 600 },
    LithologyClass { lith: "ev", lith_full: "evaporites", lith_num: 700 },
    LithologyClass { lith: "rock", lith_full: "rocks", lith_num: 800 },
    LithologyClass { lith: "soil", lith_full: "soil", lith_num: 900 },
    LithologyClass { lith: "coal", lith_full: "coal", lith_num: 1000 },
];

/// Looks up a class by raster code. Returns `None` if not found.
pub fn find_class(lith_num: i32) -> Option<&'static LithologyClass> {
    LITHOLOGY_REGISTRY.iter().find(|c| c.lith_num == lith_num)
}

// ---------------------------------------------------------------------------
// Reclassification
// ---------------------------------------------------------------------------

/// Codes grouped into class 1: coarse unconsolidated sediments (and soil).
const COARSE_UNCONSOLIDATED: &[i32] = &[100, 101, 102, 104, 108, 900];

/// Codes grouped into class 2: fine unconsolidated sediments.
const FINE_UNCONSOLIDATED: &[i32] = &[103, 105, 106, 107, 109];

/// Collapses a raw GLiM code into the four aquifer classes.
///
///   1 = coarse unconsolidated sediments
///   2 = fine unconsolidated sediments
///   3 = sedimentary rocks (199..=298)
///   4 = rocks (299..=801)
///  -1 = anything else, or no data
///
/// The rock band wins at 299 where the two inclusive bands touch.
pub fn litho_class(glim_raw: Option<i32>) -> i32 {
    let Some(code) = glim_raw else {
        return LITHO_UNDEFINED;
    };

    if (299..=801).contains(&code) {
        4
    } else if (199..=298).contains(&code) {
        3
    } else if FINE_UNCONSOLIDATED.contains(&code) {
        2
    } else if COARSE_UNCONSOLIDATED.contains(&code) {
        1
    } else {
        LITHO_UNDEFINED
    }
}

/// Two-way split used for bias analysis: 1 for plain unconsolidated
/// sediments (code 100), 2 for any other sampled code, -1 for no data.
pub fn binary_class(glim_raw: Option<i32>) -> i32 {
    match glim_raw {
        Some(100) => 1,
        Some(_) => 2,
        None => LITHO_UNDEFINED,
    }
}

/// Samples the raster at the well and stores both the raw code and its class.
///
/// Wells without coordinates get no code and the undefined class.
pub fn annotate<S: RasterSampler + ?Sized>(well: &mut WellSummary, sampler: &S) {
    well.glim_raw = well.coordinates().and_then(|(x, y)| sampler.sample(x, y));
    well.litho_class = litho_class(well.glim_raw);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
