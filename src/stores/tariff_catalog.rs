use crate::models::tariff::Tariff;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only tariff catalog, loaded from configuration at startup
pub struct TariffCatalog {
    tariffs: BTreeMap<u32, Arc<Tariff>>,
}

impl TariffCatalog {
    pub fn new(tariffs: impl IntoIterator<Item = Tariff>) -> Self {
        Self {
            tariffs: tariffs
                .into_iter()
                .map(|tariff| (tariff.id, Arc::new(tariff)))
                .collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<Arc<Tariff>> {
        self.tariffs.get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.tariffs.contains_key(&id)
    }

    /// All tariffs ordered by id
    pub fn list(&self) -> Vec<Arc<Tariff>> {
        self.tariffs.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tariffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tariffs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tariff(id: u32, limit: u64) -> Tariff {
        Tariff {
            id,
            name: format!("plan-{}", id),
            description: String::new(),
            traffic_limit: limit,
            price: id as f64,
        }
    }

    #[test]
    fn test_lookup_and_order() {
        let catalog = TariffCatalog::new(vec![tariff(3, 30), tariff(1, 10), tariff(2, 20)]);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(2).unwrap().traffic_limit, 20);
        assert!(catalog.get(9).is_none());
        assert!(catalog.contains(1));

        let ids: Vec<u32> = catalog.list().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
