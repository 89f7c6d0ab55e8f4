/// Data ingestion for the GEOWAT well toolkit.
///
/// Submodules:
/// - `geowat`: yearly head and lookup queries against the `gerbil` schema.

pub mod geowat;
