use super::schema::COLUMN_FAMILIES;
use crate::foundation::Result;
use crate::storage_err;
use rocksdb::{ColumnFamilyDescriptor, Options as RocksOptions, DB};
use std::path::Path;

/// Opens (or creates) the database with every column family in [`COLUMN_FAMILIES`].
///
/// Writes are fsynced; blocks, logs and the key ring must survive a crash right after a cycle.
pub fn open_db_with_cfs(path: impl AsRef<Path>) -> Result<DB> {
    let mut options = RocksOptions::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_use_fsync(true);
    options.set_paranoid_checks(true);

    let descriptors = COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, RocksOptions::default()));
    DB::open_cf_descriptors(&options, path, descriptors).map_err(|err| storage_err!("rocksdb open_cf_descriptors", err))
}
