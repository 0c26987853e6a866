//! Semantic checks over a zone tree.
//!
//! [`check_zone`] walks the zone in canonical order and dispatches the
//! check functions whose level intersects the mask derived from the
//! [`CheckOption`]. Findings are reported through the [`SemHandler`];
//! only infrastructure failures abort the walk.

mod checks;
mod error;
mod validator;

pub use self::error::SemError;
pub use self::validator::{ValidationFailure, ValidationHint, ValidationStatus, ZoneValidator};

use crate::name::Name;
use crate::rdata::{RdataError, NSEC3_ALGORITHM_SHA1};
use crate::rrtype::RrType;
use crate::zone::{RrSet, Zone};
use std::fmt;

/// Which check families to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOption {
    /// Only the checks every served zone must pass.
    MandatoryOnly,
    /// Mandatory and optional data checks, no DNSSEC pass.
    Full,
    /// Everything including the DNSSEC validation pass.
    Dnssec,
    /// Like `Dnssec`, but only when the zone carries DNSSEC material.
    AutoDnssec,
}

/// Bit set selecting check functions for one run.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct CheckLevel(u8);

impl CheckLevel {
    pub(crate) const MANDATORY: Self = Self(1);
    pub(crate) const OPTIONAL: Self = Self(1 << 1);
    pub(crate) const NSEC: Self = Self(1 << 2);
    pub(crate) const NSEC3: Self = Self(1 << 3);

    pub(crate) fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// Sink for semantic findings.
///
/// The callback receives every finding in walk order; the fatal flag is
/// set whenever a hard-fatal code passes through.
pub struct SemHandler<'cb> {
    fatal_error: bool,
    cb: Box<dyn FnMut(&Zone, &Name, SemError, Option<&str>) + 'cb>,
}

impl<'cb> SemHandler<'cb> {
    pub fn new(cb: impl FnMut(&Zone, &Name, SemError, Option<&str>) + 'cb) -> Self {
        Self {
            fatal_error: false,
            cb: Box::new(cb),
        }
    }

    /// Whether a hard-fatal finding was emitted.
    pub fn fatal_error(&self) -> bool {
        self.fatal_error
    }

    pub(crate) fn emit(&mut self, zone: &Zone, owner: &Name, error: SemError, info: Option<&str>) {
        if error.is_fatal() {
            self.fatal_error = true;
        }
        (self.cb)(zone, owner, error, info);
    }
}

impl fmt::Debug for SemHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemHandler")
            .field("fatal_error", &self.fatal_error)
            .finish_non_exhaustive()
    }
}

/// Per-run state shared by all check functions.
pub(crate) struct CheckContext<'a, 'cb> {
    pub(crate) zone: &'a Zone,
    pub(crate) handler: &'a mut SemHandler<'cb>,
    pub(crate) level: CheckLevel,
    /// Reference wall-clock time (unix seconds) for the validation pass.
    time: u64,
}

type CheckFn = fn(&crate::zone::Node, &mut CheckContext<'_, '_>) -> Result<(), CheckError>;

struct CheckFunction {
    function: CheckFn,
    level: CheckLevel,
}

/// Check functions and the levels at which they run.
const CHECK_FUNCTIONS: &[CheckFunction] = &[
    CheckFunction {
        function: checks::soa,
        level: CheckLevel::MANDATORY,
    },
    CheckFunction {
        function: checks::cname,
        level: CheckLevel::MANDATORY,
    },
    CheckFunction {
        function: checks::dname,
        level: CheckLevel::MANDATORY,
    },
    // Mandatory for the apex, optional for everything below.
    CheckFunction {
        function: checks::delegation,
        level: CheckLevel::MANDATORY,
    },
    CheckFunction {
        function: checks::ds,
        level: CheckLevel::OPTIONAL,
    },
    CheckFunction {
        function: checks::submission,
        level: CheckLevel::NSEC.union(CheckLevel::NSEC3),
    },
];

/// Failures that abort a check run.
///
/// Semantic findings are not errors; they are reported through the
/// handler. The exception is [`CheckError::SemanticChecksFailed`], which
/// summarizes that at least one hard-fatal finding was emitted.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("zone fails semantic checks")]
    SemanticChecksFailed,
    #[error("malformed record data: {0}")]
    Rdata(#[from] RdataError),
    #[error("DNSSEC validation failed: {0}")]
    Validation(#[source] ValidationFailure),
}

/// Run the semantic checks over `zone`.
///
/// Findings go to `handler`; `time` is the reference time (unix seconds)
/// handed to the validator. The `validator` runs after the walk when
/// `option` requests a DNSSEC pass; its localized findings are translated
/// into the semantic taxonomy, everything else propagates.
///
/// Returns [`CheckError::SemanticChecksFailed`] when a hard-fatal finding
/// was emitted, before any validation pass runs.
pub fn check_zone(
    zone: &Zone,
    option: CheckOption,
    handler: &mut SemHandler<'_>,
    time: u64,
    validator: Option<&dyn ZoneValidator>,
) -> Result<(), CheckError> {
    let mut level = CheckLevel::MANDATORY;
    let dnssec = option == CheckOption::Dnssec
        || (option == CheckOption::AutoDnssec && zone.dnssec());

    if option != CheckOption::MandatoryOnly {
        level.insert(CheckLevel::OPTIONAL);
        if dnssec {
            match zone.apex().rrset(RrType::NSEC3PARAM) {
                Some(nsec3param) => {
                    level.insert(CheckLevel::NSEC3);
                    check_nsec3param(nsec3param, zone, handler)?;
                }
                None => level.insert(CheckLevel::NSEC),
            }
        }
    }

    let mut ctx = CheckContext {
        zone,
        handler,
        level,
        time,
    };
    zone.walk(|node| {
        for check in CHECK_FUNCTIONS {
            if ctx.level.intersects(check.level) {
                (check.function)(node, &mut ctx)?;
            }
        }
        Ok::<(), CheckError>(())
    })?;

    if ctx.handler.fatal_error() {
        return Err(CheckError::SemanticChecksFailed);
    }

    if dnssec {
        if let Some(validator) = validator {
            validator::verify_dnssec(ctx.zone, ctx.handler, ctx.time, validator)?;
        }
    }

    Ok(())
}

/// One-shot NSEC3PARAM sanity checks at the apex.
fn check_nsec3param(
    nsec3param: &RrSet,
    zone: &Zone,
    handler: &mut SemHandler<'_>,
) -> Result<(), CheckError> {
    let rdata = match nsec3param.rdatas.first() {
        Some(rdata) => rdata,
        None => return Ok(()),
    };

    // Only the opt-out bit is defined (RFC 5155, Section 4.1.2).
    if rdata.nsec3param_flags()? & !1 != 0 {
        handler.emit(
            zone,
            zone.apex_owner(),
            SemError::Nsec3paramRdataFlags,
            None,
        );
    }
    if rdata.nsec3param_algorithm()? != NSEC3_ALGORITHM_SHA1 {
        handler.emit(zone, zone.apex_owner(), SemError::Nsec3paramRdataAlg, None);
    }

    Ok(())
}
