//! In-memory zone tree.
//!
//! A [`Zone`] is an immutable tree of [`Node`]s in canonical name order,
//! produced by a [`ZoneBuilder`]. The builder materializes empty
//! non-terminals, derives node flags, and keeps NSEC3 owners in their own
//! tree the way signed zones separate the hashed namespace.

use crate::name::Name;
use crate::rdata::Rdata;
use crate::rrtype::RrType;
use std::collections::BTreeMap;
use std::fmt;

/// Property bits of a zone node.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags(u16);

impl NodeFlags {
    /// The node is the zone apex.
    pub const APEX: Self = Self(1);
    /// Non-apex node owning an NS RRSet (start of a zone cut).
    pub const DELEGATION: Self = Self(1 << 1);
    /// Node below a zone cut (glue side, not authoritative).
    pub const NONAUTH: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_apex(self) -> bool {
        self.contains(Self::APEX)
    }

    pub fn is_delegation(self) -> bool {
        self.contains(Self::DELEGATION)
    }

    pub fn is_nonauth(self) -> bool {
        self.contains(Self::NONAUTH)
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.is_apex() {
            set.entry(&"apex");
        }
        if self.is_delegation() {
            set.entry(&"delegation");
        }
        if self.is_nonauth() {
            set.entry(&"nonauth");
        }
        set.finish()
    }
}

/// All records of one type at one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrSet {
    pub rrtype: RrType,
    pub ttl: u32,
    pub rdatas: Vec<Rdata>,
}

impl RrSet {
    /// Number of records in the set.
    pub fn count(&self) -> usize {
        self.rdatas.len()
    }
}

/// One owner name and everything stored at it.
#[derive(Debug, Clone)]
pub struct Node {
    owner: Name,
    flags: NodeFlags,
    rrsets: BTreeMap<RrType, RrSet>,
    children: usize,
    nsec3_node: Option<Name>,
}

impl Node {
    fn new(owner: Name) -> Self {
        Self {
            owner,
            flags: NodeFlags::default(),
            rrsets: BTreeMap::new(),
            children: 0,
            nsec3_node: None,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn rrset(&self, rrtype: RrType) -> Option<&RrSet> {
        self.rrsets.get(&rrtype)
    }

    pub fn has_rrtype(&self, rrtype: RrType) -> bool {
        self.rrsets.contains_key(&rrtype)
    }

    /// Number of RRSets stored at this owner.
    pub fn rrset_count(&self) -> usize {
        self.rrsets.len()
    }

    /// Number of direct children in the name hierarchy.
    pub fn children(&self) -> usize {
        self.children
    }

    /// Owner of the NSEC3 node covering this name, if linked.
    pub fn nsec3_node(&self) -> Option<&Name> {
        self.nsec3_node.as_ref()
    }

    fn push_rdata(&mut self, rrtype: RrType, ttl: u32, rdata: Rdata) {
        let rrset = self.rrsets.entry(rrtype).or_insert_with(|| RrSet {
            rrtype,
            ttl,
            rdatas: Vec::new(),
        });
        // RRSets are semantic sets, duplicates collapse.
        if !rrset.rdatas.contains(&rdata) {
            rrset.rdatas.push(rdata);
        }
    }
}

/// Result of resolving a name inside the zone.
#[derive(Debug, Clone, Copy)]
pub enum NameLookup<'a> {
    /// The exact name exists.
    Found(&'a Node),
    /// The name does not exist; `encloser` is its closest existing ancestor.
    Missing { encloser: &'a Node },
    /// The name does not belong to this zone.
    OutOfZone,
}

/// An immutable zone tree.
#[derive(Debug, Clone)]
pub struct Zone {
    apex: Name,
    nodes: BTreeMap<Name, Node>,
    nsec3_nodes: BTreeMap<Name, Node>,
    dnssec: bool,
}

impl Zone {
    pub fn apex_owner(&self) -> &Name {
        &self.apex
    }

    pub fn apex(&self) -> &Node {
        &self.nodes[&self.apex]
    }

    pub fn is_apex(&self, node: &Node) -> bool {
        *node.owner() == self.apex
    }

    /// Whether the zone carries DNSSEC material.
    pub fn dnssec(&self) -> bool {
        self.dnssec
    }

    pub fn find_node(&self, name: &Name) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn find_nsec3_node(&self, name: &Name) -> Option<&Node> {
        self.nsec3_nodes.get(name)
    }

    /// Resolve `name` to its node or closest existing encloser.
    pub fn find_encloser(&self, name: &Name) -> NameLookup<'_> {
        if !name.is_subdomain_of(&self.apex) {
            return NameLookup::OutOfZone;
        }
        if let Some(node) = self.nodes.get(name) {
            return NameLookup::Found(node);
        }
        let mut ancestor = name.parent();
        while let Some(candidate) = ancestor {
            if let Some(node) = self.nodes.get(&candidate) {
                return NameLookup::Missing { encloser: node };
            }
            ancestor = candidate.parent();
        }
        // The apex node always exists, so the loop above cannot pass it.
        unreachable!("no encloser found for in-zone name {name}")
    }

    /// Visit every node of the normal tree in canonical order.
    pub fn walk<E>(&self, mut f: impl FnMut(&Node) -> Result<(), E>) -> Result<(), E> {
        for node in self.nodes.values() {
            f(node)?;
        }
        Ok(())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

/// Accumulates records and assembles a [`Zone`].
#[derive(Debug)]
pub struct ZoneBuilder {
    apex: Name,
    records: Vec<(Name, RrType, u32, Rdata)>,
    nsec3_links: Vec<(Name, Name)>,
    dnssec: Option<bool>,
}

impl ZoneBuilder {
    pub fn new(apex: Name) -> Self {
        Self {
            apex,
            records: Vec::new(),
            nsec3_links: Vec::new(),
            dnssec: None,
        }
    }

    /// Add one record.
    pub fn rr(mut self, owner: Name, rrtype: RrType, ttl: u32, rdata: Vec<u8>) -> Self {
        self.records.push((owner, rrtype, ttl, Rdata::new(rdata)));
        self
    }

    /// Link `owner` to the NSEC3 node that covers it.
    ///
    /// The hash computation that produces this pairing belongs to the
    /// signing machinery; the tree only stores the result.
    pub fn link_nsec3(mut self, owner: Name, nsec3_owner: Name) -> Self {
        self.nsec3_links.push((owner, nsec3_owner));
        self
    }

    /// Force the DNSSEC flag instead of deriving it from apex records.
    pub fn dnssec(mut self, dnssec: bool) -> Self {
        self.dnssec = Some(dnssec);
        self
    }

    pub fn build(self) -> Zone {
        let mut nodes = BTreeMap::new();
        let mut nsec3_nodes = BTreeMap::new();
        nodes.insert(self.apex.clone(), Node::new(self.apex.clone()));

        for (owner, rrtype, ttl, rdata) in self.records {
            if !owner.is_subdomain_of(&self.apex) {
                log::warn!("ignoring out-of-zone record {owner} {rrtype}");
                continue;
            }
            if rrtype == RrType::NSEC3 {
                nsec3_nodes
                    .entry(owner.clone())
                    .or_insert_with(|| Node::new(owner.clone()))
                    .push_rdata(rrtype, ttl, rdata);
                continue;
            }
            // Materialize empty non-terminals up to the apex.
            let mut ancestor = owner.parent();
            while let Some(name) = ancestor {
                if !name.is_subdomain_of(&self.apex) || nodes.contains_key(&name) {
                    break;
                }
                nodes.insert(name.clone(), Node::new(name.clone()));
                ancestor = name.parent();
            }
            nodes
                .entry(owner.clone())
                .or_insert_with(|| Node::new(owner.clone()))
                .push_rdata(rrtype, ttl, rdata);
        }

        // Flags, relying on canonical order visiting parents first.
        let mut cut: Option<Name> = None;
        for (owner, node) in &mut nodes {
            if let Some(cut_name) = &cut {
                if owner != cut_name && owner.is_subdomain_of(cut_name) {
                    node.flags.insert(NodeFlags::NONAUTH);
                    continue;
                }
                cut = None;
            }
            if *owner == self.apex {
                node.flags.insert(NodeFlags::APEX);
            } else if node.has_rrtype(RrType::NS) {
                node.flags.insert(NodeFlags::DELEGATION);
                cut = Some(owner.clone());
            }
        }

        // Direct child counts; NSEC3 owners count against their parent too.
        let child_names: Vec<Name> = nodes
            .keys()
            .filter(|name| **name != self.apex)
            .cloned()
            .chain(nsec3_nodes.keys().cloned())
            .collect();
        for name in child_names {
            if let Some(parent) = name.parent() {
                if let Some(node) = nodes.get_mut(&parent) {
                    node.children += 1;
                }
            }
        }

        for (owner, nsec3_owner) in self.nsec3_links {
            if !nsec3_nodes.contains_key(&nsec3_owner) {
                log::warn!("NSEC3 link target {nsec3_owner} has no NSEC3 node");
                continue;
            }
            if let Some(node) = nodes.get_mut(&owner) {
                node.nsec3_node = Some(nsec3_owner);
            }
        }

        let apex_node = &nodes[&self.apex];
        let dnssec = self.dnssec.unwrap_or_else(|| {
            apex_node.has_rrtype(RrType::DNSKEY)
                || apex_node.has_rrtype(RrType::RRSIG)
                || apex_node.has_rrtype(RrType::NSEC3PARAM)
        });

        Zone {
            apex: self.apex,
            nodes,
            nsec3_nodes,
            dnssec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn a_rdata() -> Vec<u8> {
        vec![192, 0, 2, 1]
    }

    #[test]
    fn builder_materializes_empty_non_terminals() {
        let zone = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(name("b.a.example."), RrType::A, 300, a_rdata())
            .build();

        let ent = zone.find_node(&name("a.example.")).expect("non-terminal");
        assert_eq!(ent.rrset_count(), 0);
        assert_eq!(ent.children(), 1);
        assert_eq!(zone.apex().children(), 1);
    }

    #[test]
    fn delegation_and_nonauth_flags() {
        let zone = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(name("sub.example."), RrType::NS, 300, b"\x02ns\x03sub\x07example\x00".to_vec())
            .rr(name("ns.sub.example."), RrType::A, 300, a_rdata())
            .rr(name("www.example."), RrType::A, 300, a_rdata())
            .build();

        assert!(zone.apex().flags().is_apex());
        assert!(zone
            .find_node(&name("sub.example."))
            .unwrap()
            .flags()
            .is_delegation());
        assert!(zone
            .find_node(&name("ns.sub.example."))
            .unwrap()
            .flags()
            .is_nonauth());
        assert!(!zone
            .find_node(&name("www.example."))
            .unwrap()
            .flags()
            .is_nonauth());
    }

    #[test]
    fn encloser_lookup() {
        let zone = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(name("a.example."), RrType::A, 300, a_rdata())
            .build();

        assert!(matches!(
            zone.find_encloser(&name("a.example.")),
            NameLookup::Found(_)
        ));
        match zone.find_encloser(&name("x.a.example.")) {
            NameLookup::Missing { encloser } => {
                assert_eq!(encloser.owner(), &name("a.example."));
            }
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert!(matches!(
            zone.find_encloser(&name("other.test.")),
            NameLookup::OutOfZone
        ));
    }

    #[test]
    fn nsec3_nodes_live_in_their_own_tree() {
        let hashed = name("0p9mhaveqvm6t7vbl5lop2u3t2rp3tom.example.");
        let zone = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(hashed.clone(), RrType::NSEC3, 300, vec![1, 0, 0, 10, 0])
            .link_nsec3(name("example."), hashed.clone())
            .build();

        assert!(zone.find_node(&hashed).is_none());
        assert!(zone.find_nsec3_node(&hashed).is_some());
        assert_eq!(zone.apex().nsec3_node(), Some(&hashed));
        // The hashed owner still counts as a child of the apex.
        assert_eq!(zone.apex().children(), 1);
    }

    #[test]
    fn walk_visits_in_canonical_order() {
        let zone = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(name("z.example."), RrType::A, 300, a_rdata())
            .rr(name("a.example."), RrType::A, 300, a_rdata())
            .build();

        let mut visited = Vec::new();
        zone.walk(|node| {
            visited.push(node.owner().to_string());
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(visited, ["example.", "a.example.", "z.example."]);
    }

    #[test]
    fn dnssec_flag_is_derived_from_apex() {
        let plain = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .build();
        assert!(!plain.dnssec());

        let signed = ZoneBuilder::new(name("example."))
            .rr(name("example."), RrType::SOA, 3600, vec![0])
            .rr(name("example."), RrType::DNSKEY, 3600, vec![1, 1, 3, 13])
            .build();
        assert!(signed.dnssec());
    }
}
