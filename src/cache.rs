// src/cache.rs
use crate::types::SubdomainRecord;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of the name.
    Inserted,
    /// Known name, this many new IPs appended.
    Extended(usize),
    Unchanged,
}

/// Canonical subdomain → IP set mapping for one run.
///
/// `merge` is the only mutation: IP sets only grow, names are never removed,
/// so the final contents do not depend on the order providers report in.
#[derive(Debug, Default)]
pub struct AggregationCache {
    entries: HashMap<String, Vec<String>>,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge<I>(&mut self, name: &str, ips: I) -> MergeOutcome
    where
        I: IntoIterator<Item = String>,
    {
        match self.entries.get_mut(name) {
            Some(known) => {
                let before = known.len();
                for ip in ips {
                    if !known.contains(&ip) {
                        known.push(ip);
                    }
                }
                match known.len() - before {
                    0 => MergeOutcome::Unchanged,
                    added => MergeOutcome::Extended(added),
                }
            }
            None => {
                let mut fresh: Vec<String> = Vec::new();
                for ip in ips {
                    if !fresh.contains(&ip) {
                        fresh.push(ip);
                    }
                }
                self.entries.insert(name.to_string(), fresh);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|ips| ips.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `(name, ip)` pairs held.
    pub fn ip_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Records sorted by name.
    pub fn export(&self) -> Vec<SubdomainRecord> {
        let mut records: Vec<SubdomainRecord> = self
            .entries
            .iter()
            .map(|(name, ips)| SubdomainRecord {
                subdomain: name.clone(),
                ips: ips.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
        records
    }
}
