use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use seasonroom_core::{CrewId, Reservation, YearMonth};

/// The user's active reservations as last fetched for one viewed month.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthSnapshot {
    pub reservations: Vec<Reservation>,
    pub usage_count: u32,
}

/// Read-through cache keyed by `(crew, viewed month)`. Mutating commands
/// must call [`CalendarCache::invalidate_crew`].
#[derive(Debug, Default)]
pub struct CalendarCache {
    entries: Mutex<HashMap<(CrewId, YearMonth), MonthSnapshot>>,
}

impl CalendarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, crew_id: CrewId, month: YearMonth) -> Option<MonthSnapshot> {
        self.entries.lock().get(&(crew_id, month)).cloned()
    }

    pub fn insert(&self, crew_id: CrewId, month: YearMonth, snapshot: MonthSnapshot) {
        self.entries.lock().insert((crew_id, month), snapshot);
    }

    pub fn invalidate_crew(&self, crew_id: CrewId) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(crew, _), _| *crew != crew_id);
        debug!(crew_id, dropped = before - entries.len(), "invalidated month cache");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use seasonroom_core::YearMonth;

    use super::{CalendarCache, MonthSnapshot};

    #[test]
    fn invalidation_is_per_crew() {
        let cache = CalendarCache::new();
        let dec = YearMonth::new(2025, 12).expect("month");
        let jan = dec.succ();
        cache.insert(1, dec, MonthSnapshot::default());
        cache.insert(1, jan, MonthSnapshot::default());
        cache.insert(2, dec, MonthSnapshot { reservations: vec![], usage_count: 4 });

        cache.invalidate_crew(1);
        assert!(cache.get(1, dec).is_none());
        assert!(cache.get(1, jan).is_none());
        assert_eq!(cache.get(2, dec).map(|s| s.usage_count), Some(4));
        assert_eq!(cache.len(), 1);
    }
}
