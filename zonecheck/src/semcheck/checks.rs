//! The per-node check functions.

use super::{CheckContext, CheckError, CheckLevel, SemError};
use crate::rdata::{dnskey_to_ds, RdataError};
use crate::rrtype::RrType;
use crate::zone::{NameLookup, Node};

/// The five zero octets signalling DNSSEC takedown via CDS.
const DELETE_CDS: &[u8] = &[0x00, 0x00, 0x00, 0x00, 0x00];
/// The CDNSKEY takedown body (flags 0, protocol 3, algorithm 0).
const DELETE_CDNSKEY: &[u8] = &[0x00, 0x00, 0x03, 0x00, 0x00];

/// Expected DS digest length per digest type (SHA-1, SHA-256, GOST, SHA-384).
const DS_DIGEST_SIZES: [usize; 5] = [0, 20, 32, 32, 48];

fn ds_digest_supported(digest_type: u8) -> bool {
    (1..=4).contains(&digest_type)
}

/// The apex must hold a SOA record.
pub(super) fn soa(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    if !ctx.zone.is_apex(node) {
        return Ok(());
    }

    if node.rrset(RrType::SOA).is_none() {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::SoaNone, None);
    }

    Ok(())
}

/// A CNAME owner must hold nothing else, and only a single CNAME.
pub(super) fn cname(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    let cname_rrs = match node.rrset(RrType::CNAME) {
        Some(rrset) => rrset,
        None => return Ok(()),
    };

    // With DNSSEC the node may additionally hold NSEC and RRSIG.
    let mut rrset_limit = 1;
    if node.has_rrtype(RrType::NSEC) {
        rrset_limit += 1;
    }
    if node.has_rrtype(RrType::RRSIG) {
        rrset_limit += 1;
    }

    if node.rrset_count() > rrset_limit {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::CnameExtraRecords, None);
    }
    if cname_rrs.count() != 1 {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::CnameMultiple, None);
    }

    Ok(())
}

/// DNAME constraints of RFC 6672, Section 2.
pub(super) fn dname(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    let dname_rrs = match node.rrset(RrType::DNAME) {
        Some(rrset) => rrset,
        None => return Ok(()),
    };

    let is_apex = node.flags().is_apex();
    if !is_apex && node.has_rrtype(RrType::NS) {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::DnameExtraNs, None);
    }

    // The NSEC3 node of the apex counts as the apex's child.
    let allowed_children = usize::from(is_apex && node.nsec3_node().is_some());
    if node.children() > allowed_children {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::DnameChildren, None);
    }

    if dname_rrs.count() != 1 {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::DnameMultiple, None);
    }

    Ok(())
}

/// NS presence at the apex and glue for in-bailiwick NS targets.
pub(super) fn delegation(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    let is_apex = ctx.zone.is_apex(node);
    if !(node.flags().is_delegation() || is_apex) {
        return Ok(());
    }
    // The apex is always checked, other nodes only with optional checks on.
    if !ctx.level.intersects(CheckLevel::OPTIONAL) && !is_apex {
        return Ok(());
    }

    let ns_rrs = match node.rrset(RrType::NS) {
        Some(rrset) => rrset,
        None => {
            debug_assert!(is_apex);
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::NsApex, None);
            return Ok(());
        }
    };

    for ns in &ns_rrs.rdatas {
        let target = ns.ns_target()?;
        let glue = match ctx.zone.find_encloser(&target) {
            // Out of bailiwick, no glue needed.
            NameLookup::OutOfZone => continue,
            NameLookup::Missing { encloser } => {
                if encloser.owner() != node.owner()
                    && (encloser.flags().is_delegation() || encloser.flags().is_nonauth())
                {
                    // Below another delegation, not our glue to provide.
                    continue;
                }
                // The target may still be covered by a wildcard.
                ctx.zone.find_node(&encloser.owner().prepend_wildcard())
            }
            NameLookup::Found(glue_node) => Some(glue_node),
        };

        let has_address = glue
            .map_or(false, |g| g.has_rrtype(RrType::A) || g.has_rrtype(RrType::AAAA));
        if !has_address {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::NsGlue, None);
        }
    }

    Ok(())
}

/// DS digest algorithm support and digest lengths.
pub(super) fn ds(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    let dss = match node.rrset(RrType::DS) {
        Some(rrset) => rrset,
        None => return Ok(()),
    };

    for ds in &dss.rdatas {
        let key_tag = ds.ds_key_tag()?;
        let digest_type = ds.ds_digest_type()?;
        let info = format!("(keytag {key_tag})");

        if !ds_digest_supported(digest_type) {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::DsRdataAlg, Some(&info));
        } else if DS_DIGEST_SIZES[usize::from(digest_type)] != ds.ds_digest_len()? {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::DsRdataDiglen, Some(&info));
        }
    }

    Ok(())
}

/// CDS/CDNSKEY parent-submission consistency.
pub(super) fn submission(node: &Node, ctx: &mut CheckContext<'_, '_>) -> Result<(), CheckError> {
    let (cdss, cdnskeys) = match (node.rrset(RrType::CDS), node.rrset(RrType::CDNSKEY)) {
        (None, None) => return Ok(()),
        (None, Some(_)) => {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::CdsNone, None);
            return Ok(());
        }
        (Some(_), None) => {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::CdnskeyNone, None);
            return Ok(());
        }
        (Some(cdss), Some(cdnskeys)) => (cdss, cdnskeys),
    };

    let dnskeys = ctx.zone.apex().rrset(RrType::DNSKEY);
    if dnskeys.is_none() {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::DnskeyNone, None);
    }

    let mut delete_cds = false;
    let mut delete_cdnskey = false;

    // Every non-delete CDNSKEY must byte-match a published DNSKEY.
    for cdnskey in &cdnskeys.rdatas {
        if cdnskey.as_bytes() == DELETE_CDNSKEY {
            delete_cdnskey = true;
            continue;
        }

        let matched = dnskeys.map_or(false, |dnskeys| {
            dnskeys
                .rdatas
                .iter()
                .any(|dnskey| dnskey.as_bytes() == cdnskey.as_bytes())
        });
        if !matched {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::CdnskeyNoDnskey, None);
        }
    }

    // Every non-delete CDS must equal the DS of some CDNSKEY.
    for cds in &cdss.rdatas {
        if cds.as_bytes() == DELETE_CDS {
            delete_cds = true;
            continue;
        }
        let digest_type = cds.ds_digest_type()?;

        let mut matched = false;
        for cdnskey in &cdnskeys.rdatas {
            let computed = match dnskey_to_ds(ctx.zone.apex_owner(), cdnskey, digest_type) {
                Ok(computed) => computed,
                // Not usable as key material, skip it as a match candidate.
                Err(RdataError::Truncated { .. }) => continue,
                Err(err) => return Err(err.into()),
            };
            if computed.as_bytes() == cds.as_bytes() {
                matched = true;
                break;
            }
        }
        if !matched {
            ctx.handler
                .emit(ctx.zone, node.owner(), SemError::CdsNotMatch, None);
        }
    }

    // A takedown must consist of exactly the delete pair and nothing else.
    if (delete_cds && (!delete_cdnskey || cdss.count() > 1))
        || (delete_cdnskey && (!delete_cds || cdnskeys.count() > 1))
    {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::CdnskeyInvalidDelete, None);
    }

    if cdss.count() < cdnskeys.count() {
        ctx.handler
            .emit(ctx.zone, node.owner(), SemError::CdnskeyNoCds, None);
    }

    Ok(())
}
