pub mod analysis;
pub mod config;
pub mod db;
pub mod export;
pub mod ingest;
pub mod lithology;
pub mod logging;
pub mod model;
pub mod raster;
pub mod report;
pub mod weighting;
