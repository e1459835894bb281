//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `emissions` - Emission records (key: record id)
//! - `verifications` - Verification records (key: record id)
//! - `balances` - FuelEU positions (key: company id || period year)
//! - `allocations` - Pool allocations (key: vessel id || period year)
//! - `eua_ops` - Append-only EUA operations (key: operation id)
//! - `indices` - Secondary indices for fast lookups
//!
//! Keying the `allocations` family by (vessel, period) makes the
//! one-allocation-per-vessel-per-period constraint a property of the
//! storage layout itself: a second row for the same pair cannot exist.
//!
//! Index keys carry a leading tag byte so prefix scans stay disjoint.

use crate::{
    error::{Error, Result},
    types::{
        CompanyId, EmissionRecord, EuaOperation, FuelEuBalance, PeriodYear, PoolAllocation,
        PoolId, VerificationRecord, VesselId, VoyageId,
    },
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_EMISSIONS: &str = "emissions";
const CF_VERIFICATIONS: &str = "verifications";
const CF_BALANCES: &str = "balances";
const CF_ALLOCATIONS: &str = "allocations";
const CF_EUA_OPS: &str = "eua_ops";
const CF_INDICES: &str = "indices";

/// Index tags (first key byte)
const IDX_VOYAGE_EMISSION: u8 = 0x01;
const IDX_EMISSION_VERIFICATION: u8 = 0x02;
const IDX_COMPANY_OPERATION: u8 = 0x03;
const IDX_POOL_ALLOCATION: u8 = 0x04;

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EMISSIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_VERIFICATIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_ALLOCATIONS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_EUA_OPS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "opened compliance ledger storage");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // State rows are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    // Key encodings

    fn period_key(id: &Uuid, period: PeriodYear) -> [u8; 20] {
        let mut key = [0u8; 20];
        key[..16].copy_from_slice(id.as_bytes());
        key[16..].copy_from_slice(&period.get().to_be_bytes());
        key
    }

    fn index_voyage_emission(voyage_id: VoyageId, emission_id: Uuid) -> Vec<u8> {
        let mut key = vec![IDX_VOYAGE_EMISSION];
        key.extend_from_slice(voyage_id.as_uuid().as_bytes());
        key.extend_from_slice(emission_id.as_bytes());
        key
    }

    fn index_emission_verification(emission_id: Uuid, verification_id: Uuid) -> Vec<u8> {
        let mut key = vec![IDX_EMISSION_VERIFICATION];
        key.extend_from_slice(emission_id.as_bytes());
        key.extend_from_slice(verification_id.as_bytes());
        key
    }

    fn index_company_operation(company_id: CompanyId, operation_id: Uuid) -> Vec<u8> {
        let mut key = vec![IDX_COMPANY_OPERATION];
        key.extend_from_slice(company_id.as_uuid().as_bytes());
        key.extend_from_slice(operation_id.as_bytes());
        key
    }

    fn index_pool_allocation(pool_id: PoolId, period: PeriodYear, vessel_id: VesselId) -> Vec<u8> {
        let mut key = vec![IDX_POOL_ALLOCATION];
        key.extend_from_slice(pool_id.as_uuid().as_bytes());
        key.extend_from_slice(&period.get().to_be_bytes());
        key.extend_from_slice(vessel_id.as_uuid().as_bytes());
        key
    }

    /// Collect the trailing UUIDs of all index keys under a prefix
    fn scan_index_suffix_uuids(&self, prefix: &[u8]) -> Result<Vec<Uuid>> {
        let cf = self.cf(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if key.len() >= prefix.len() + 16 {
                let bytes: [u8; 16] = key[key.len() - 16..]
                    .try_into()
                    .map_err(|_| Error::Storage("malformed index key".to_string()))?;
                ids.push(Uuid::from_bytes(bytes));
            }
        }
        Ok(ids)
    }

    // Emission operations

    /// Insert emission record with its voyage index (atomic)
    pub fn put_emission(&self, record: &EmissionRecord) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_emissions = self.cf(CF_EMISSIONS)?;
        batch.put_cf(&cf_emissions, record.id.as_bytes(), bincode::serialize(record)?);

        let cf_indices = self.cf(CF_INDICES)?;
        batch.put_cf(
            &cf_indices,
            Self::index_voyage_emission(record.voyage_id, record.id),
            [],
        );

        self.db.write(batch)?;

        tracing::debug!(
            emission_id = %record.id,
            voyage_id = %record.voyage_id,
            "emission recorded"
        );

        Ok(())
    }

    /// Overwrite an existing emission record (index unchanged)
    pub fn update_emission(&self, record: &EmissionRecord) -> Result<()> {
        let cf = self.cf(CF_EMISSIONS)?;
        self.db
            .put_cf(&cf, record.id.as_bytes(), bincode::serialize(record)?)?;
        Ok(())
    }

    /// Get emission record by ID
    pub fn get_emission(&self, emission_id: Uuid) -> Result<EmissionRecord> {
        let cf = self.cf(CF_EMISSIONS)?;
        let value = self
            .db
            .get_cf(&cf, emission_id.as_bytes())?
            .ok_or_else(|| Error::not_found("emission record not found"))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get all emission records for a voyage (via index)
    pub fn emissions_for_voyage(&self, voyage_id: VoyageId) -> Result<Vec<EmissionRecord>> {
        let mut prefix = vec![IDX_VOYAGE_EMISSION];
        prefix.extend_from_slice(voyage_id.as_uuid().as_bytes());

        let mut records = Vec::new();
        for id in self.scan_index_suffix_uuids(&prefix)? {
            records.push(self.get_emission(id)?);
        }
        Ok(records)
    }

    // Verification operations

    /// Append verification record with its emission index (atomic)
    pub fn put_verification(&self, record: &VerificationRecord) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_verifications = self.cf(CF_VERIFICATIONS)?;
        batch.put_cf(
            &cf_verifications,
            record.id.as_bytes(),
            bincode::serialize(record)?,
        );

        let cf_indices = self.cf(CF_INDICES)?;
        batch.put_cf(
            &cf_indices,
            Self::index_emission_verification(record.emission_record_id, record.id),
            [],
        );

        self.db.write(batch)?;
        Ok(())
    }

    /// Get verification record by ID
    pub fn get_verification(&self, verification_id: Uuid) -> Result<VerificationRecord> {
        let cf = self.cf(CF_VERIFICATIONS)?;
        let value = self
            .db
            .get_cf(&cf, verification_id.as_bytes())?
            .ok_or_else(|| Error::not_found("verification record not found"))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get all verification records attached to an emission record
    pub fn verifications_for_emission(&self, emission_id: Uuid) -> Result<Vec<VerificationRecord>> {
        let mut prefix = vec![IDX_EMISSION_VERIFICATION];
        prefix.extend_from_slice(emission_id.as_bytes());

        let mut records = Vec::new();
        for id in self.scan_index_suffix_uuids(&prefix)? {
            records.push(self.get_verification(id)?);
        }
        Ok(records)
    }

    // FuelEU balance operations

    /// Get balance row, if one exists
    pub fn get_balance(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
    ) -> Result<Option<FuelEuBalance>> {
        let cf = self.cf(CF_BALANCES)?;
        let key = Self::period_key(company_id.as_uuid(), period_year);
        match self.db.get_cf(&cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Write one balance row
    pub fn put_balance(&self, balance: &FuelEuBalance) -> Result<()> {
        let cf = self.cf(CF_BALANCES)?;
        let key = Self::period_key(balance.company_id().as_uuid(), balance.period_year());
        self.db.put_cf(&cf, key, bincode::serialize(balance)?)?;
        Ok(())
    }

    /// Write two balance rows in a single atomic commit
    ///
    /// Cross-period operations (banking, borrowing) must not be able to
    /// leave one side updated and the other not.
    pub fn put_balances(&self, first: &FuelEuBalance, second: &FuelEuBalance) -> Result<()> {
        let cf = self.cf(CF_BALANCES)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf,
            Self::period_key(first.company_id().as_uuid(), first.period_year()),
            bincode::serialize(first)?,
        );
        batch.put_cf(
            &cf,
            Self::period_key(second.company_id().as_uuid(), second.period_year()),
            bincode::serialize(second)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    // Pool allocation operations

    /// Get the allocation for a (vessel, period), if any
    pub fn get_allocation(
        &self,
        vessel_id: VesselId,
        period_year: PeriodYear,
    ) -> Result<Option<PoolAllocation>> {
        let cf = self.cf(CF_ALLOCATIONS)?;
        let key = Self::period_key(vessel_id.as_uuid(), period_year);
        match self.db.get_cf(&cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Insert allocation row with its pool index (atomic)
    pub fn put_allocation(&self, allocation: &PoolAllocation) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_allocations = self.cf(CF_ALLOCATIONS)?;
        batch.put_cf(
            &cf_allocations,
            Self::period_key(allocation.vessel_id.as_uuid(), allocation.period_year),
            bincode::serialize(allocation)?,
        );

        let cf_indices = self.cf(CF_INDICES)?;
        batch.put_cf(
            &cf_indices,
            Self::index_pool_allocation(
                allocation.pool_id,
                allocation.period_year,
                allocation.vessel_id,
            ),
            [],
        );

        self.db.write(batch)?;

        tracing::debug!(
            vessel_id = %allocation.vessel_id,
            pool_id = %allocation.pool_id,
            period_year = %allocation.period_year,
            "pool allocation recorded"
        );

        Ok(())
    }

    /// Get all allocations for a pool and period (via index)
    pub fn allocations_for_pool(
        &self,
        pool_id: PoolId,
        period_year: PeriodYear,
    ) -> Result<Vec<PoolAllocation>> {
        let mut prefix = vec![IDX_POOL_ALLOCATION];
        prefix.extend_from_slice(pool_id.as_uuid().as_bytes());
        prefix.extend_from_slice(&period_year.get().to_be_bytes());

        let mut allocations = Vec::new();
        for vessel in self.scan_index_suffix_uuids(&prefix)? {
            if let Some(allocation) = self.get_allocation(VesselId::new(vessel), period_year)? {
                allocations.push(allocation);
            }
        }
        Ok(allocations)
    }

    // EUA operations

    /// Append EUA operation with its company index (atomic)
    pub fn append_eua_operation(&self, operation: &EuaOperation) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_ops = self.cf(CF_EUA_OPS)?;
        batch.put_cf(&cf_ops, operation.id.as_bytes(), bincode::serialize(operation)?);

        let cf_indices = self.cf(CF_INDICES)?;
        batch.put_cf(
            &cf_indices,
            Self::index_company_operation(operation.company_id, operation.id),
            [],
        );

        self.db.write(batch)?;

        tracing::debug!(
            operation_id = %operation.id,
            company_id = %operation.company_id,
            operation_type = ?operation.operation_type,
            "EUA operation appended"
        );

        Ok(())
    }

    /// Get EUA operation by ID
    pub fn get_eua_operation(&self, operation_id: Uuid) -> Result<EuaOperation> {
        let cf = self.cf(CF_EUA_OPS)?;
        let value = self
            .db
            .get_cf(&cf, operation_id.as_bytes())?
            .ok_or_else(|| Error::not_found("EUA operation not found"))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get all EUA operations for a company (via index)
    pub fn operations_for_company(&self, company_id: CompanyId) -> Result<Vec<EuaOperation>> {
        let mut prefix = vec![IDX_COMPANY_OPERATION];
        prefix.extend_from_slice(company_id.as_uuid().as_bytes());

        let mut operations = Vec::new();
        for id in self.scan_index_suffix_uuids(&prefix)? {
            operations.push(self.get_eua_operation(id)?);
        }
        Ok(operations)
    }
}
