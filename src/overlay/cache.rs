//! Line cache: what the overlay believes is currently drawn

use ordered_float::OrderedFloat;

use super::style::LineRole;
use crate::chart::LineHandle;
use crate::trading::EntityKey;

/// One drawn line and the identity it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    pub key: EntityKey,
    pub role: LineRole,
    pub handle: LineHandle,
    /// Last price drawn, compared exactly to skip redundant redraws
    pub value: OrderedFloat<f64>,
    pub symbol: String,
}

impl LineRecord {
    pub fn price(&self) -> f64 {
        self.value.into_inner()
    }
}

/// Ordered collection of line records, at most one per `(key, role)`
#[derive(Debug, Clone, Default)]
pub struct LineCache {
    records: Vec<LineRecord>,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineRecord> {
        self.records.iter()
    }

    pub fn get(&self, key: &EntityKey, role: LineRole) -> Option<&LineRecord> {
        self.records
            .iter()
            .find(|record| record.role == role && &record.key == key)
    }

    pub fn contains(&self, key: &EntityKey, role: LineRole) -> bool {
        self.get(key, role).is_some()
    }

    /// Insert a record, replacing the existing one for the same slot in place
    pub fn upsert(&mut self, record: LineRecord) -> Option<LineRecord> {
        match self
            .records
            .iter_mut()
            .find(|existing| existing.role == record.role && existing.key == record.key)
        {
            Some(existing) => Some(std::mem::replace(existing, record)),
            None => {
                self.records.push(record);
                None
            }
        }
    }

    pub fn remove(&mut self, key: &EntityKey, role: LineRole) -> Option<LineRecord> {
        let idx = self
            .records
            .iter()
            .position(|record| record.role == role && &record.key == key)?;
        Some(self.records.remove(idx))
    }

    /// Slots matching `predicate`, in cache order
    pub fn slots_where<F>(&self, mut predicate: F) -> Vec<(EntityKey, LineRole)>
    where
        F: FnMut(&LineRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|record| predicate(record))
            .map(|record| (record.key.clone(), record.role))
            .collect()
    }

    /// Forget every record, returning them
    pub fn clear(&mut self) -> Vec<LineRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: EntityKey, role: LineRole, handle: &str, value: f64) -> LineRecord {
        LineRecord {
            key,
            role,
            handle: LineHandle::new(handle),
            value: OrderedFloat(value),
            symbol: "SOL".to_string(),
        }
    }

    #[test]
    fn test_upsert_keeps_one_record_per_slot() {
        let mut cache = LineCache::new();
        let key = EntityKey::Position("P1".to_string());

        assert!(cache.upsert(record(key.clone(), LineRole::Entry, "h1", 100.0)).is_none());
        assert!(cache.upsert(record(key.clone(), LineRole::Liquidation, "h2", 80.0)).is_none());
        let replaced = cache.upsert(record(key.clone(), LineRole::Entry, "h3", 101.0));

        assert_eq!(replaced.unwrap().handle, LineHandle::new("h1"));
        assert_eq!(cache.len(), 2);
        let first = cache.iter().next().unwrap();
        assert_eq!(first.handle, LineHandle::new("h3"));
        assert_eq!(first.price(), 101.0);
    }

    #[test]
    fn test_remove_and_slots() {
        let mut cache = LineCache::new();
        let p1 = EntityKey::Position("P1".to_string());
        let order = EntityKey::LimitOrder(7);
        cache.upsert(record(p1.clone(), LineRole::Entry, "h1", 100.0));
        cache.upsert(record(order.clone(), LineRole::LimitOrderTrigger, "h2", 50.0));

        let orders = cache.slots_where(|r| r.key.is_limit_order());
        assert_eq!(orders, vec![(order.clone(), LineRole::LimitOrderTrigger)]);

        assert!(cache.remove(&p1, LineRole::Liquidation).is_none());
        assert!(cache.remove(&p1, LineRole::Entry).is_some());
        assert!(!cache.contains(&p1, LineRole::Entry));
        assert_eq!(cache.clear().len(), 1);
        assert!(cache.is_empty());
    }
}
