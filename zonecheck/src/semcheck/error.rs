//! The closed taxonomy of semantic findings.

/// A semantic finding reported through the handler.
///
/// `Display` renders the stable one-line description used in logs and
/// tests. The hard-fatal subset (SOA/CNAME/DNAME structure violations)
/// flips the handler's fatal flag and turns the final status into
/// [`super::CheckError::SemanticChecksFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumIter)]
pub enum SemError {
    #[strum(serialize = "missing SOA at the zone apex")]
    SoaNone,

    #[strum(serialize = "more records exist at CNAME")]
    CnameExtraRecords,
    #[strum(serialize = "multiple CNAME records")]
    CnameMultiple,

    #[strum(serialize = "child record exists under DNAME")]
    DnameChildren,
    #[strum(serialize = "multiple DNAME records")]
    DnameMultiple,
    #[strum(serialize = "NS record exists at DNAME")]
    DnameExtraNs,

    #[strum(serialize = "missing NS at the zone apex")]
    NsApex,
    #[strum(serialize = "missing glue record")]
    NsGlue,

    #[strum(serialize = "wrong type covered in RRSIG")]
    RrsigRdataTypeCovered,
    #[strum(serialize = "wrong original TTL in RRSIG")]
    RrsigRdataTtl,
    #[strum(serialize = "expired RRSIG")]
    RrsigRdataExpiration,
    #[strum(serialize = "RRSIG inception in the future")]
    RrsigRdataInception,
    #[strum(serialize = "wrong labels in RRSIG")]
    RrsigRdataLabels,
    #[strum(serialize = "wrong signer's name in RRSIG")]
    RrsigRdataOwner,
    #[strum(serialize = "missing RRSIG")]
    RrsigNoRrsig,
    #[strum(serialize = "signed RRSIG")]
    RrsigSigned,
    #[strum(serialize = "unverifiable signature")]
    RrsigUnverifiable,

    #[strum(serialize = "missing NSEC")]
    NsecNone,
    #[strum(serialize = "incorrect type bitmap in NSEC")]
    NsecRdataBitmap,
    #[strum(serialize = "multiple NSEC records")]
    NsecRdataMultiple,
    #[strum(serialize = "incoherent NSEC chain")]
    NsecRdataChain,

    #[strum(serialize = "missing NSEC3")]
    Nsec3None,
    #[strum(serialize = "insecure delegation outside NSEC3 opt-out")]
    Nsec3InsecureDelegationOpt,
    #[strum(serialize = "invalid record type in NSEC3 chain")]
    Nsec3ExtraRecord,
    #[strum(serialize = "inconsistent TTL for NSEC3 and minimum TTL in SOA")]
    Nsec3RdataTtl,
    #[strum(serialize = "incoherent NSEC3 chain")]
    Nsec3RdataChain,
    #[strum(serialize = "incorrect type bitmap in NSEC3")]
    Nsec3RdataBitmap,
    #[strum(serialize = "incorrect flags in NSEC3")]
    Nsec3RdataFlags,
    #[strum(serialize = "incorrect salt in NSEC3")]
    Nsec3RdataSalt,
    #[strum(serialize = "incorrect algorithm in NSEC3")]
    Nsec3RdataAlg,
    #[strum(serialize = "incorrect number of iterations in NSEC3")]
    Nsec3RdataIters,

    #[strum(serialize = "invalid flags in NSEC3PARAM")]
    Nsec3paramRdataFlags,
    #[strum(serialize = "invalid algorithm in NSEC3PARAM")]
    Nsec3paramRdataAlg,

    #[strum(serialize = "invalid algorithm in DS")]
    DsRdataAlg,
    #[strum(serialize = "invalid digest length in DS")]
    DsRdataDiglen,

    #[strum(serialize = "missing DNSKEY")]
    DnskeyNone,
    #[strum(serialize = "invalid DNSKEY")]
    DnskeyInvalid,
    #[strum(serialize = "invalid protocol in DNSKEY")]
    DnskeyRdataProtocol,

    #[strum(serialize = "missing CDS")]
    CdsNone,
    #[strum(serialize = "CDS not match CDNSKEY")]
    CdsNotMatch,

    #[strum(serialize = "missing CDNSKEY")]
    CdnskeyNone,
    #[strum(serialize = "CDNSKEY not match DNSKEY")]
    CdnskeyNoDnskey,
    #[strum(serialize = "CDNSKEY without corresponding CDS")]
    CdnskeyNoCds,
    #[strum(serialize = "invalid CDNSKEY/CDS for DNSSEC delete algorithm")]
    CdnskeyInvalidDelete,

    #[strum(serialize = "unknown error")]
    Unknown,
}

impl SemError {
    /// Whether this finding makes the whole check run fail.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::SoaNone
                | Self::CnameExtraRecords
                | Self::CnameMultiple
                | Self::DnameChildren
                | Self::DnameMultiple
                | Self::DnameExtraNs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use strum::IntoEnumIterator as _;

    #[test]
    fn message_table() {
        let table: String = SemError::iter()
            .map(|err| format!("{err:?}: {err}\n"))
            .collect();
        expect![[r#"
            SoaNone: missing SOA at the zone apex
            CnameExtraRecords: more records exist at CNAME
            CnameMultiple: multiple CNAME records
            DnameChildren: child record exists under DNAME
            DnameMultiple: multiple DNAME records
            DnameExtraNs: NS record exists at DNAME
            NsApex: missing NS at the zone apex
            NsGlue: missing glue record
            RrsigRdataTypeCovered: wrong type covered in RRSIG
            RrsigRdataTtl: wrong original TTL in RRSIG
            RrsigRdataExpiration: expired RRSIG
            RrsigRdataInception: RRSIG inception in the future
            RrsigRdataLabels: wrong labels in RRSIG
            RrsigRdataOwner: wrong signer's name in RRSIG
            RrsigNoRrsig: missing RRSIG
            RrsigSigned: signed RRSIG
            RrsigUnverifiable: unverifiable signature
            NsecNone: missing NSEC
            NsecRdataBitmap: incorrect type bitmap in NSEC
            NsecRdataMultiple: multiple NSEC records
            NsecRdataChain: incoherent NSEC chain
            Nsec3None: missing NSEC3
            Nsec3InsecureDelegationOpt: insecure delegation outside NSEC3 opt-out
            Nsec3ExtraRecord: invalid record type in NSEC3 chain
            Nsec3RdataTtl: inconsistent TTL for NSEC3 and minimum TTL in SOA
            Nsec3RdataChain: incoherent NSEC3 chain
            Nsec3RdataBitmap: incorrect type bitmap in NSEC3
            Nsec3RdataFlags: incorrect flags in NSEC3
            Nsec3RdataSalt: incorrect salt in NSEC3
            Nsec3RdataAlg: incorrect algorithm in NSEC3
            Nsec3RdataIters: incorrect number of iterations in NSEC3
            Nsec3paramRdataFlags: invalid flags in NSEC3PARAM
            Nsec3paramRdataAlg: invalid algorithm in NSEC3PARAM
            DsRdataAlg: invalid algorithm in DS
            DsRdataDiglen: invalid digest length in DS
            DnskeyNone: missing DNSKEY
            DnskeyInvalid: invalid DNSKEY
            DnskeyRdataProtocol: invalid protocol in DNSKEY
            CdsNone: missing CDS
            CdsNotMatch: CDS not match CDNSKEY
            CdnskeyNone: missing CDNSKEY
            CdnskeyNoDnskey: CDNSKEY not match DNSKEY
            CdnskeyNoCds: CDNSKEY without corresponding CDS
            CdnskeyInvalidDelete: invalid CDNSKEY/CDS for DNSSEC delete algorithm
            Unknown: unknown error
        "#]]
        .assert_eq(&table);
    }

    #[test]
    fn fatal_subset() {
        let fatal: Vec<SemError> = SemError::iter().filter(|e| e.is_fatal()).collect();
        assert_eq!(
            fatal,
            [
                SemError::SoaNone,
                SemError::CnameExtraRecords,
                SemError::CnameMultiple,
                SemError::DnameChildren,
                SemError::DnameMultiple,
                SemError::DnameExtraNs,
            ]
        );
    }
}
