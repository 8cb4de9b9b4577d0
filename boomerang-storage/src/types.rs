/// Opaque identifier for a `ScheduledItem`.
///
/// Backed by a ULID: globally unique, lexicographically sortable by creation
/// time, assigned once by `StorageManager::Save` and stable for the item's
/// lifetime (invariant I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    id: ulid::Ulid,
}

impl ItemId {
    /// Generate a new unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self { id: ulid::Ulid::new() }
    }

    /// Parse an id previously produced by [`Self::generate`] or [`ToString`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        ulid::Ulid::from_string(s).ok().map(|id| Self { id })
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for ItemId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_parseable() {
        let a = ItemId::generate();
        let b = ItemId::generate();
        assert_ne!(a, b);
        assert_eq!(ItemId::parse(&a.to_string()), Some(a));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(ItemId::parse("not-a-ulid"), None);
        assert_eq!(ItemId::parse("../etc/passwd"), None);
    }

    #[test]
    fn ids_sort_lexicographically_by_creation_order() {
        let mut ids: Vec<ItemId> = (0..10).map(|_| ItemId::generate()).collect();
        let generated_order = ids.clone();
        ids.sort();
        assert_eq!(ids, generated_order);
    }
}
