/// Integration tests against a GEOWAT database copy
///
/// Tests verify:
/// 1. Session open/close through `with_session`
/// 2. Presence of `_gwh_yearly_tb` and `_lookup_tb` in the configured schema
/// 3. Yearly head and lookup queries return well-formed rows
/// 4. Aggregation and the id-keyed join over real rows
/// 5. NULL key columns are reported as errors
///
/// Prerequisites:
/// - PostgreSQL with the `gerbil` schema loaded
/// - DATABASE_URL set in .env
///
/// Run with: cargo test --test database_integration -- --ignored --test-threads=1

use std::collections::HashSet;
use std::env;

use geowat_wells::analysis::aggregate;
use geowat_wells::config::DatabaseConfig;
use geowat_wells::db::{self, DbError};
use geowat_wells::ingest::geowat;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn test_db_config() -> DatabaseConfig {
    dotenv::dotenv().ok();
    let url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    DatabaseConfig {
        url: Some(url),
        ..DatabaseConfig::default()
    }
}

/// A country with wells in the test database, when one is configured.
fn test_country() -> Option<String> {
    env::var("GEOWAT_TEST_COUNTRY").ok().filter(|c| !c.is_empty())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_required_tables_exist() {
    let status = db::with_session(&test_db_config(), db::verify_tables)
        .expect("Failed to verify tables");
    assert!(status.all_present(), "missing tables: {:?}", status.tables);
    for table in &status.tables {
        assert!(table.rows.is_some());
    }
}

#[test]
#[ignore]
fn test_closure_error_is_returned_after_close() {
    let result: Result<(), DbError> = db::with_session(&test_db_config(), |_| {
        Err(DbError::InvalidIdentifier("from closure".to_string()))
    });
    assert!(matches!(result, Err(DbError::InvalidIdentifier(ref s)) if s == "from closure"));
}

#[test]
#[ignore]
fn test_bad_credentials_fail_to_connect() {
    dotenv::dotenv().ok();
    let config = DatabaseConfig {
        url: None,
        host: "127.0.0.1".to_string(),
        port: 1,
        ..DatabaseConfig::default()
    };
    let result = db::with_session(&config, |_| Ok(()));
    assert!(matches!(result, Err(DbError::Postgres(_))));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_fetch_lookup_rows_are_unique_by_id() {
    let country = test_country();
    let lookups = db::with_session(&test_db_config(), |s| geowat::fetch_lookup(s, country.as_deref()))
        .expect("Failed to fetch lookup rows");
    assert!(!lookups.is_empty(), "lookup table returned no rows");

    let ids: HashSet<i64> = lookups.iter().map(|l| l.id_gerbil).collect();
    assert!(ids.len() <= lookups.len());
    for record in &lookups {
        if let (Some(x), Some(y)) = (record.x_wgs84, record.y_wgs84) {
            assert!(x.abs() <= 180.0 && y.abs() <= 90.0, "well {} at ({}, {})", record.id_gerbil, x, y);
        }
    }
}

#[test]
#[ignore]
fn test_summary_pipeline_over_real_rows() {
    let country = test_country();
    let (heads, lookups) = db::with_session(&test_db_config(), |s| {
        let heads = geowat::fetch_yearly_heads(s, country.as_deref())?;
        let lookups = geowat::fetch_lookup(s, country.as_deref())?;
        Ok((heads, lookups))
    })
    .expect("Failed to query well tables");
    assert!(!heads.is_empty(), "yearly table returned no rows");

    let aggregates = aggregate::aggregate_heads(&heads);
    let total_years: u32 = aggregates.iter().map(|a| a.n_years).sum();
    assert_eq!(total_years as usize, heads.len());

    let joined = aggregate::join_with_lookup(&aggregates, &lookups).expect("Join failed");
    assert_eq!(joined.wells.len() + joined.unmatched_aggregates, aggregates.len());
    assert!(joined.wells.windows(2).all(|w| w[0].id_gerbil < w[1].id_gerbil));
}

#[test]
#[ignore]
fn test_null_key_columns_are_errors() {
    let (head, lookup) = db::with_session(&test_db_config(), |s| {
        let head_row = s
            .client()
            .query_one("SELECT NULL::BIGINT, 2000::INT, 150.0::DOUBLE PRECISION", &[])?;
        let lookup_row = s.client().query_one(
            "SELECT 7::BIGINT, NULL::TEXT, NULL::DOUBLE PRECISION,
                    NULL::DOUBLE PRECISION, NULL::DOUBLE PRECISION, NULL::DOUBLE PRECISION",
            &[],
        )?;
        Ok((geowat::yearly_head_from_row(&head_row), geowat::lookup_from_row(&lookup_row)))
    })
    .expect("Failed to run literal queries");

    assert!(matches!(head, Err(DbError::Postgres(_))));
    let lookup = lookup.expect("nullable lookup columns should read as None");
    assert_eq!(lookup.id_gerbil, 7);
    assert!(lookup.x_wgs84.is_none() && lookup.id_orig_src.is_none());
}
