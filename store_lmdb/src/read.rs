//! Read helpers shared by read-only and read-write transactions.

use std::ops::Bound;

use heed::types::Bytes;
use heed::{Database, RoTxn};
use serde::de::DeserializeOwned;

use crate::keys::prefix_upper_bound;
use crate::LmdbError;

pub(crate) type Db = Database<Bytes, Bytes>;

pub(crate) fn get_record<T: DeserializeOwned>(
    db: &Db,
    txn: &RoTxn<'_>,
    key: &[u8],
) -> Result<Option<T>, LmdbError> {
    match db.get(txn, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn all_records<T: DeserializeOwned>(
    db: &Db,
    txn: &RoTxn<'_>,
) -> Result<Vec<T>, LmdbError> {
    let mut records = Vec::new();
    for entry in db.iter(txn)? {
        let (_key, val) = entry?;
        records.push(bincode::deserialize(val)?);
    }
    Ok(records)
}

/// Identifiers stored under keys starting with `prefix`, in key order.
/// `limit == 0` means no limit.
pub(crate) fn index_values(
    db: &Db,
    txn: &RoTxn<'_>,
    prefix: &[u8],
    limit: usize,
) -> Result<Vec<[u8; 32]>, LmdbError> {
    let upper = prefix_upper_bound(prefix);
    let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (
        Bound::Included(prefix),
        match upper.as_deref() {
            Some(upper) => Bound::Excluded(upper),
            None => Bound::Unbounded,
        },
    );

    let mut ids = Vec::new();
    for entry in db.range(txn, &bounds)? {
        if limit > 0 && ids.len() >= limit {
            break;
        }
        let (_key, val) = entry?;
        let id: [u8; 32] = val
            .try_into()
            .map_err(|_| LmdbError::Corruption(format!("index value of {} bytes", val.len())))?;
        ids.push(id);
    }
    Ok(ids)
}

/// Load the records an index points at. A dangling entry is corruption.
pub(crate) fn resolve<T: DeserializeOwned>(
    db: &Db,
    txn: &RoTxn<'_>,
    ids: &[[u8; 32]],
    kind: &str,
) -> Result<Vec<T>, LmdbError> {
    ids.iter()
        .map(|id| {
            get_record(db, txn, id)?
                .ok_or_else(|| LmdbError::Corruption(format!("{kind} {}", hex_prefix(id))))
        })
        .collect()
}

fn hex_prefix(id: &[u8; 32]) -> String {
    id[..4].iter().map(|b| format!("{b:02x}")).collect()
}
