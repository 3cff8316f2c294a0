//! Bank address resolution over an immutable snapshot of the active set.
//!
//! Addresses compare case-insensitively after trimming. Variants are never
//! unified implicitly: a sender only sees another address's patterns through
//! an explicitly registered alias.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::models::pattern::{BankAddressInfo, BankAlias, Pattern, PatternStatus};

/// Canonical lookup key for a sender address.
pub fn address_key(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Candidate order: priority descending, most recently approved first, then id.
pub fn candidate_order(a: &Pattern, b: &Pattern) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.decided_at.cmp(&a.decided_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Published active set: patterns grouped by address, plus the alias table.
#[derive(Debug, Default)]
pub struct ActiveIndex {
    by_address: HashMap<String, Vec<Arc<Pattern>>>,
    aliases: HashMap<String, String>,
    addresses: Vec<BankAddressInfo>,
}

impl ActiveIndex {
    /// Build an index from active patterns; anything not ACTIVE is skipped.
    pub fn build(patterns: Vec<Pattern>, aliases: &[BankAlias]) -> Self {
        let mut by_address: HashMap<String, Vec<Arc<Pattern>>> = HashMap::new();
        let mut addresses: HashMap<String, BankAddressInfo> = HashMap::new();

        for pattern in patterns
            .into_iter()
            .filter(|p| p.status == PatternStatus::Active)
        {
            let key = address_key(&pattern.bank_address);
            addresses.entry(key.clone()).or_insert_with(|| BankAddressInfo {
                address: pattern.bank_address.trim().to_string(),
                bank_name: pattern.bank_name.clone(),
            });
            by_address.entry(key).or_default().push(Arc::new(pattern));
        }
        for candidates in by_address.values_mut() {
            candidates.sort_by(|a, b| candidate_order(a, b));
        }

        let aliases = aliases
            .iter()
            .map(|a| (address_key(&a.alias), address_key(&a.address)))
            .filter(|(alias, address)| alias != address)
            .collect();

        let mut addresses: Vec<BankAddressInfo> = addresses.into_values().collect();
        addresses.sort_by_key(|a| address_key(&a.address));

        Self {
            by_address,
            aliases,
            addresses,
        }
    }

    /// Ordered active candidates for `sender`. Empty when nothing is active.
    pub fn resolve(&self, sender: &str) -> Vec<Arc<Pattern>> {
        let key = address_key(sender);
        let direct = self.by_address.get(&key);
        let aliased = self
            .aliases
            .get(&key)
            .and_then(|target| self.by_address.get(target));

        match (direct, aliased) {
            (None, None) => Vec::new(),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (Some(direct), Some(aliased)) => {
                let mut seen: HashSet<Uuid> = HashSet::new();
                let mut merged: Vec<Arc<Pattern>> = direct
                    .iter()
                    .chain(aliased.iter())
                    .filter(|p| seen.insert(p.id))
                    .cloned()
                    .collect();
                merged.sort_by(|a, b| candidate_order(a, b));
                merged
            }
        }
    }

    /// Bank name for an address or alias with at least one active pattern.
    pub fn bank_name(&self, sender: &str) -> Option<String> {
        self.resolve(sender).first().map(|p| p.bank_name.clone())
    }

    /// Distinct addresses with an active pattern, sorted case-insensitively.
    pub fn addresses(&self) -> &[BankAddressInfo] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.by_address.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
