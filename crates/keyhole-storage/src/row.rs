use crate::error::map_sqlx_error;
use jiff::Timestamp;
use keyhole_core::error::Result;
use keyhole_core::{Fingerprint, ShortKey, StorageError, UrlRecord};
use sqlx::{ColumnIndex, Decode, Row, Type};

/// Columns selected by every record query, in [`decode_record`] order.
pub(crate) const RECORD_COLUMNS: &str = "original_url, fingerprint, short_key, created_at";

pub(crate) fn decode_record<'r, R>(row: &'r R) -> Result<UrlRecord>
where
    R: Row,
    &'r str: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
{
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let fingerprint: String = row.try_get("fingerprint").map_err(map_sqlx_error)?;
    let key: String = row.try_get("short_key").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        original_url,
        fingerprint: Fingerprint::new(fingerprint),
        key: ShortKey::new_unchecked(key),
        created_at: parse_created_at(created_at)?,
    })
}

fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}
