use std::collections::HashSet;

/// Identity of a business within one request: lowercased, trimmed name,
/// address and phone. Formatting differences beyond case and surrounding
/// whitespace make two keys distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    name: String,
    address: String,
    phone: String,
}

impl DedupKey {
    pub fn new(name: &str, address: Option<&str>, phone: Option<&str>) -> Self {
        DedupKey {
            name: normalize(Some(name)),
            address: normalize(address),
            phone: normalize(phone),
        }
    }
}

fn normalize(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

/// Businesses already emitted (or queued) during one request.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<DedupKey>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    /// Record `key`; returns `false` if it was already present.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
