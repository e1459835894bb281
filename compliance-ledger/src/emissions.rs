//! Emission ledger
//!
//! Records and amends per-voyage verified emission facts. The one
//! interesting rule lives here: verification is a one-way door. Any
//! number of pending or rejected verification records may accumulate,
//! but the first `Verified` one makes the emission record permanently
//! immutable.

use crate::{
    actor::LedgerHandle,
    directory::FleetDirectory,
    error::{Error, Result},
    storage::Storage,
    types::{
        EmissionPatch, EmissionRecord, EmissionSource, PeriodYear, VerificationRecord,
        VerificationStatus, VoyageId,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Input for recording a new emission
#[derive(Debug, Clone)]
pub struct NewEmission {
    /// Voyage the emissions are attributed to
    pub voyage_id: VoyageId,
    /// Compliance period
    pub period_year: PeriodYear,
    /// CO2 emitted, tonnes
    pub co2_tonnes: Decimal,
    /// CH4 emitted, tonnes
    pub ch4_tonnes: Option<Decimal>,
    /// N2O emitted, tonnes
    pub n2o_tonnes: Option<Decimal>,
    /// Energy consumed, GJ
    pub energy_gj: Decimal,
    /// Import source
    pub source: EmissionSource,
}

/// Input for attaching a verification record
#[derive(Debug, Clone)]
pub struct NewVerification {
    /// Parent emission record
    pub emission_record_id: Uuid,
    /// Accredited verifier
    pub verifier_id: Uuid,
    /// Decision status
    pub status: VerificationStatus,
    /// Certificate reference, if issued
    pub certificate_number: Option<String>,
    /// Free-text findings
    pub findings: Option<String>,
}

/// Service facade for emission facts
pub struct EmissionLedger<D> {
    handle: LedgerHandle,
    storage: Arc<Storage>,
    directory: Arc<D>,
}

impl<D: FleetDirectory> EmissionLedger<D> {
    pub(crate) fn new(handle: LedgerHandle, storage: Arc<Storage>, directory: Arc<D>) -> Self {
        Self {
            handle,
            storage,
            directory,
        }
    }

    /// Record verified emission facts for a voyage
    ///
    /// Validates shape (positive CO2 and energy), then confirms the
    /// voyage exists with the fleet directory collaborator before
    /// persisting.
    pub async fn record_emission(&self, new: NewEmission) -> Result<EmissionRecord> {
        if new.co2_tonnes <= Decimal::ZERO {
            return Err(Error::validation("CO2 emissions must be positive"));
        }
        if new.energy_gj <= Decimal::ZERO {
            return Err(Error::validation("energy must be positive"));
        }

        if !self.directory.voyage_exists(new.voyage_id).await? {
            return Err(Error::not_found("voyage not found"));
        }

        let now = Utc::now();
        let record = EmissionRecord {
            id: Uuid::now_v7(),
            voyage_id: new.voyage_id,
            period_year: new.period_year,
            co2_tonnes: new.co2_tonnes,
            ch4_tonnes: new.ch4_tonnes,
            n2o_tonnes: new.n2o_tonnes,
            energy_gj: new.energy_gj,
            source: new.source,
            created_at: now,
            updated_at: now,
        };

        self.handle.record_emission(record).await
    }

    /// Partially update an unverified emission record
    pub async fn update_emission(
        &self,
        emission_id: Uuid,
        patch: EmissionPatch,
    ) -> Result<EmissionRecord> {
        if let Some(co2) = patch.co2_tonnes {
            if co2 <= Decimal::ZERO {
                return Err(Error::validation("CO2 emissions must be positive"));
            }
        }
        if let Some(energy) = patch.energy_gj {
            if energy <= Decimal::ZERO {
                return Err(Error::validation("energy must be positive"));
            }
        }

        self.handle.update_emission(emission_id, patch).await
    }

    /// Attach a verification record to an emission record
    ///
    /// Appends unconditionally; a rejection does not prevent a later
    /// successful verification attempt.
    pub async fn add_verification(&self, new: NewVerification) -> Result<VerificationRecord> {
        // Emission records are never deleted, so the existence check can
        // run outside the writer without a race.
        self.storage.get_emission(new.emission_record_id)?;

        let now = Utc::now();
        let record = VerificationRecord {
            id: Uuid::now_v7(),
            emission_record_id: new.emission_record_id,
            verifier_id: new.verifier_id,
            status: new.status,
            certificate_number: new.certificate_number,
            findings: new.findings,
            verified_at: now,
            created_at: now,
        };

        self.handle.add_verification(record).await
    }

    /// Fleet directory collaborator
    pub fn fleet_directory(&self) -> &D {
        &self.directory
    }

    /// Get one emission record
    pub fn emission(&self, emission_id: Uuid) -> Result<EmissionRecord> {
        self.storage.get_emission(emission_id)
    }

    /// Get all emission records for a set of voyages
    pub fn emissions_for_voyages(&self, voyage_ids: &[VoyageId]) -> Result<Vec<EmissionRecord>> {
        let mut records = Vec::new();
        for voyage_id in voyage_ids {
            records.extend(self.storage.emissions_for_voyage(*voyage_id)?);
        }
        Ok(records)
    }

    /// Get all verification records attached to an emission record
    pub fn verifications(&self, emission_id: Uuid) -> Result<Vec<VerificationRecord>> {
        self.storage.verifications_for_emission(emission_id)
    }
}

/// Apply a patch to an emission record, enforcing the immutability gate
///
/// Runs inside the writer turn so a verification cannot land between the
/// check and the write.
pub(crate) fn exec_update_emission(
    storage: &Storage,
    emission_id: Uuid,
    patch: EmissionPatch,
) -> Result<EmissionRecord> {
    let mut record = storage.get_emission(emission_id)?;

    let verified = storage
        .verifications_for_emission(emission_id)?
        .iter()
        .any(|v| v.status == VerificationStatus::Verified);
    if verified {
        return Err(Error::conflict("cannot update verified emission"));
    }

    if let Some(co2) = patch.co2_tonnes {
        record.co2_tonnes = co2;
    }
    if let Some(energy) = patch.energy_gj {
        record.energy_gj = energy;
    }
    record.updated_at = Utc::now();

    storage.update_emission(&record)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn seeded_emission(storage: &Storage) -> EmissionRecord {
        let now = Utc::now();
        let record = EmissionRecord {
            id: Uuid::now_v7(),
            voyage_id: VoyageId::new(Uuid::new_v4()),
            period_year: PeriodYear::new(2024).unwrap(),
            co2_tonnes: Decimal::from(1000),
            ch4_tonnes: None,
            n2o_tonnes: None,
            energy_gj: Decimal::from(40_000),
            source: EmissionSource::Manual,
            created_at: now,
            updated_at: now,
        };
        storage.put_emission(&record).unwrap();
        record
    }

    fn verification(emission_id: Uuid, status: VerificationStatus) -> VerificationRecord {
        let now = Utc::now();
        VerificationRecord {
            id: Uuid::now_v7(),
            emission_record_id: emission_id,
            verifier_id: Uuid::new_v4(),
            status,
            certificate_number: None,
            findings: None,
            verified_at: now,
            created_at: now,
        }
    }

    #[test]
    fn test_update_applies_patch() {
        let (storage, _temp) = test_storage();
        let record = seeded_emission(&storage);

        let patch = EmissionPatch {
            co2_tonnes: Some(Decimal::from(1200)),
            energy_gj: None,
        };
        let updated = exec_update_emission(&storage, record.id, patch).unwrap();

        assert_eq!(updated.co2_tonnes, Decimal::from(1200));
        assert_eq!(updated.energy_gj, record.energy_gj);

        let reloaded = storage.get_emission(record.id).unwrap();
        assert_eq!(reloaded.co2_tonnes, Decimal::from(1200));
    }

    #[test]
    fn test_update_missing_record_is_not_found() {
        let (storage, _temp) = test_storage();
        let result = exec_update_emission(&storage, Uuid::new_v4(), EmissionPatch::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_verified_record_rejects_update() {
        let (storage, _temp) = test_storage();
        let record = seeded_emission(&storage);

        storage
            .put_verification(&verification(record.id, VerificationStatus::Verified))
            .unwrap();

        let patch = EmissionPatch {
            co2_tonnes: Some(Decimal::from(999)),
            energy_gj: None,
        };
        let result = exec_update_emission(&storage, record.id, patch);
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Untouched
        let reloaded = storage.get_emission(record.id).unwrap();
        assert_eq!(reloaded.co2_tonnes, Decimal::from(1000));
    }

    #[test]
    fn test_pending_and_rejected_records_accept_updates() {
        let (storage, _temp) = test_storage();
        let record = seeded_emission(&storage);

        storage
            .put_verification(&verification(record.id, VerificationStatus::Pending))
            .unwrap();
        storage
            .put_verification(&verification(record.id, VerificationStatus::Rejected))
            .unwrap();

        let patch = EmissionPatch {
            co2_tonnes: None,
            energy_gj: Some(Decimal::from(41_000)),
        };
        let updated = exec_update_emission(&storage, record.id, patch).unwrap();
        assert_eq!(updated.energy_gj, Decimal::from(41_000));
    }
}
