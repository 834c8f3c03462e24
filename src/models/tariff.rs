use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Traffic ceiling in bytes
    pub traffic_limit: u64,
    pub price: f64,
}

impl Tariff {
    /// Whether `observed_bytes` is still within this tariff's ceiling
    pub fn allows(&self, observed_bytes: u64) -> bool {
        observed_bytes <= self.traffic_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_is_inclusive() {
        let tariff = Tariff {
            id: 1,
            name: "Basic".to_string(),
            description: String::new(),
            traffic_limit: 1000,
            price: 0.0,
        };

        assert!(tariff.allows(0));
        assert!(tariff.allows(1000));
        assert!(!tariff.allows(1001));
    }
}
