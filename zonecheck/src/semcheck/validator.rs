//! Adapter between the DNSSEC validator and the semantic taxonomy.

use super::{CheckError, SemError, SemHandler};
use crate::name::Name;
use crate::rrtype::RrType;
use crate::zone::Zone;

/// A full DNSSEC validation pass over a zone.
///
/// Implemented by the signing/validation machinery; the checker only
/// consumes the localized failure it reports.
pub trait ZoneValidator {
    /// Validate `zone` against the reference `time` (unix seconds).
    fn validate(&self, zone: &Zone, time: u64) -> Result<(), ValidationFailure>;
}

/// Where the validator localized a failure.
#[derive(Debug, Clone)]
pub struct ValidationHint {
    pub owner: Name,
    pub rrtype: RrType,
}

/// Failure classes a validator can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationStatus {
    #[error("signature cannot be verified")]
    MissingSignature,
    #[error("wrong NSEC type bitmap")]
    NsecBitmap,
    #[error("broken NSEC chain")]
    NsecChain,
    #[error("opt-out breaks NSEC3 coverage")]
    Nsec3OptOut,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("{0}")]
    Other(String),
}

/// A failed validation pass, optionally localized by a hint.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}")]
pub struct ValidationFailure {
    pub status: ValidationStatus,
    pub hint: Option<ValidationHint>,
}

fn status_to_sem(status: &ValidationStatus) -> SemError {
    match status {
        ValidationStatus::MissingSignature => SemError::RrsigUnverifiable,
        ValidationStatus::NsecBitmap => SemError::NsecRdataBitmap,
        ValidationStatus::NsecChain => SemError::NsecRdataChain,
        ValidationStatus::Nsec3OptOut => SemError::Nsec3InsecureDelegationOpt,
        _ => SemError::Unknown,
    }
}

/// Run the validator and translate its outcome into handler findings.
///
/// A localized failure becomes a finding at the hinted node with the
/// record type spelled out in the info field. An unlocalized bad-DNSKEY
/// failure is reported at the apex. Anything else is an infrastructure
/// failure of the validation pass itself and propagates.
pub(super) fn verify_dnssec(
    zone: &Zone,
    handler: &mut SemHandler<'_>,
    time: u64,
    validator: &dyn ZoneValidator,
) -> Result<(), CheckError> {
    let failure = match validator.validate(zone, time) {
        Ok(()) => return Ok(()),
        Err(failure) => failure,
    };

    if let Some(hint) = &failure.hint {
        let info = hint.rrtype.to_string();
        handler.emit(
            zone,
            &hint.owner,
            status_to_sem(&failure.status),
            Some(&info),
        );
        Ok(())
    } else if failure.status == ValidationStatus::InvalidPublicKey {
        handler.emit(zone, zone.apex_owner(), SemError::DnskeyInvalid, None);
        Ok(())
    } else {
        Err(CheckError::Validation(failure))
    }
}
