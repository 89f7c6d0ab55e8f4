/// Queries against the GEOWAT groundwater tables.
///
/// Both queries cast their columns in SQL so the Rust side always reads the
/// same types regardless of how a particular database copy declared them.
/// Columns are read with `try_get`, so a NULL key column surfaces as an
/// error instead of a panic.
///
/// An optional country name restricts the result to wells whose lookup row
/// carries that `country_name`.

use postgres::Row;

use crate::db::{DbError, Session, LOOKUP_TABLE, YEARLY_TABLE};
use crate::logging::{self, Stage};
use crate::model::{LookupRecord, YearlyHead};

fn yearly_heads_sql(session: &Session) -> String {
    format!(
        "SELECT y.id_gerbil::BIGINT,
                y.year::INT,
                y.gw_head_m::DOUBLE PRECISION
         FROM {yearly} y
         WHERE $1::TEXT IS NULL
            OR y.id_gerbil IN (SELECT l.id_gerbil FROM {lookup} l WHERE l.country_name = $1)
         ORDER BY y.id_gerbil, y.year",
        yearly = session.qualified(YEARLY_TABLE),
        lookup = session.qualified(LOOKUP_TABLE),
    )
}

fn lookup_sql(session: &Session) -> String {
    format!(
        "SELECT l.id_gerbil::BIGINT,
                l.id_orig_src::TEXT,
                l.x_wgs84::DOUBLE PRECISION,
                l.y_wgs84::DOUBLE PRECISION,
                l.orig_elev_m_asl::DOUBLE PRECISION,
                l.glo90_elev_m_asl::DOUBLE PRECISION
         FROM {lookup} l
         WHERE $1::TEXT IS NULL OR l.country_name = $1
         ORDER BY l.id_gerbil",
        lookup = session.qualified(LOOKUP_TABLE),
    )
}

/// `(id_gerbil, year, gw_head_m)`; a NULL id or year is an error.
pub fn yearly_head_from_row(row: &Row) -> Result<YearlyHead, DbError> {
    Ok(YearlyHead {
        id_gerbil: row.try_get(0)?,
        year: row.try_get(1)?,
        gw_head_cm: row.try_get(2)?,
    })
}

/// Lookup columns in `lookup_sql` order; only the id is required.
pub fn lookup_from_row(row: &Row) -> Result<LookupRecord, DbError> {
    Ok(LookupRecord {
        id_gerbil: row.try_get(0)?,
        id_orig_src: row.try_get(1)?,
        x_wgs84: row.try_get(2)?,
        y_wgs84: row.try_get(3)?,
        orig_elev_m_asl: row.try_get(4)?,
        glo90_elev_m_asl: row.try_get(5)?,
    })
}

/// All yearly head records, optionally for one country.
///
/// The `gw_head_m` column holds centimetres despite its name.
pub fn fetch_yearly_heads(
    session: &mut Session,
    country: Option<&str>,
) -> Result<Vec<YearlyHead>, DbError> {
    let sql = yearly_heads_sql(session);
    let rows = session.client().query(sql.as_str(), &[&country])?;

    let heads = rows
        .iter()
        .map(yearly_head_from_row)
        .collect::<Result<Vec<_>, DbError>>()?;

    logging::info(
        Stage::Database,
        None,
        &format!("fetched {} yearly head records", heads.len()),
    );
    Ok(heads)
}

/// Lookup rows (location and elevation), optionally for one country.
pub fn fetch_lookup(
    session: &mut Session,
    country: Option<&str>,
) -> Result<Vec<LookupRecord>, DbError> {
    let sql = lookup_sql(session);
    let rows = session.client().query(sql.as_str(), &[&country])?;

    let records = rows
        .iter()
        .map(lookup_from_row)
        .collect::<Result<Vec<_>, DbError>>()?;

    logging::info(
        Stage::Database,
        None,
        &format!("fetched {} lookup rows", records.len()),
    );
    Ok(records)
}
