//! Depot & route registry.
//!
//! Static reference data: cauldrons with capacities, the single enchanted
//! market, and the travel-time network between them. Loaded and validated
//! once at startup — bad reference data fails fast rather than producing
//! a snapshot built on a broken map.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::types::{BackgroundData, Cauldron};

/// Validated reference data with indexed lookups.
#[derive(Debug)]
pub struct Registry {
    background: BackgroundData,
    depots: HashMap<String, Cauldron>,
    /// Edge times keyed in both directions; couriers travel the network
    /// both ways.
    edge_times: HashMap<(String, String), f64>,
}

impl Registry {
    /// Load and validate background data from a JSON file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {path}: {e}")))?;
        let background: BackgroundData = serde_json::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("failed to parse {path}: {e}")))?;
        Self::from_background(background)
    }

    /// Validate an in-memory background bundle.
    pub fn from_background(background: BackgroundData) -> Result<Self> {
        let mut depots = HashMap::new();
        for cauldron in &background.cauldrons {
            if cauldron.max_volume <= 0.0 {
                return Err(EngineError::Config(format!(
                    "cauldron {} has non-positive max_volume {}",
                    cauldron.id, cauldron.max_volume
                )));
            }
            if depots.insert(cauldron.id.clone(), cauldron.clone()).is_some() {
                return Err(EngineError::Config(format!(
                    "duplicate cauldron id {}",
                    cauldron.id
                )));
            }
        }

        let market_id = background.enchanted_market.id.clone();
        let mut known: HashSet<&str> = depots.keys().map(String::as_str).collect();
        known.insert(&market_id);

        let mut edge_times = HashMap::new();
        for edge in &background.network.edges {
            if !known.contains(edge.from.as_str()) {
                return Err(EngineError::Config(format!(
                    "edge references unknown node {}",
                    edge.from
                )));
            }
            if !known.contains(edge.to.as_str()) {
                return Err(EngineError::Config(format!(
                    "edge references unknown node {}",
                    edge.to
                )));
            }
            if edge.travel_time_minutes <= 0.0 {
                return Err(EngineError::Config(format!(
                    "edge {} → {} has non-positive travel time {}",
                    edge.from, edge.to, edge.travel_time_minutes
                )));
            }
            edge_times.insert((edge.from.clone(), edge.to.clone()), edge.travel_time_minutes);
            edge_times.insert((edge.to.clone(), edge.from.clone()), edge.travel_time_minutes);
        }

        // Every depot must be reachable from the market.
        let mut reached: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::new();
        reached.insert(market_id.clone());
        queue.push_back(market_id.clone());
        while let Some(node) = queue.pop_front() {
            for (from, to) in edge_times.keys() {
                if *from == node && reached.insert(to.clone()) {
                    queue.push_back(to.clone());
                }
            }
        }
        for id in depots.keys() {
            if !reached.contains(id) {
                return Err(EngineError::Config(format!(
                    "cauldron {id} is unreachable from the enchanted market"
                )));
            }
        }

        info!(
            cauldrons = depots.len(),
            edges = background.network.edges.len(),
            market = %market_id,
            "Registry loaded"
        );

        Ok(Self {
            background,
            depots,
            edge_times,
        })
    }

    /// Look up a depot by id.
    pub fn get_depot(&self, id: &str) -> Result<&Cauldron> {
        self.depots
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("no cauldron {id}")))
    }

    /// Travel time between two directly connected nodes.
    ///
    /// Disconnected pairs are a `NotFound` the caller must handle — the
    /// registry never invents a travel time.
    pub fn get_edge_time(&self, a: &str, b: &str) -> Result<f64> {
        self.edge_times
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("no edge between {a} and {b}")))
    }

    /// Id of the single enchanted market node.
    pub fn market_id(&self) -> &str {
        &self.background.enchanted_market.id
    }

    /// The full background bundle, embedded verbatim in each snapshot.
    pub fn background(&self) -> &BackgroundData {
        &self.background
    }

    /// Iterate over all depot ids.
    pub fn depot_ids(&self) -> impl Iterator<Item = &str> {
        self.depots.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RouteEdge;

    #[test]
    fn test_load_valid_background() {
        let registry = Registry::from_background(BackgroundData::sample()).unwrap();
        assert_eq!(registry.market_id(), "market_1");
        assert!(registry.get_depot("cauldron_1").is_ok());
        assert!(registry.get_depot("cauldron_99").is_err());
    }

    #[test]
    fn test_edge_time_is_bidirectional() {
        let registry = Registry::from_background(BackgroundData::sample()).unwrap();
        let forward = registry.get_edge_time("cauldron_1", "market_1").unwrap();
        let back = registry.get_edge_time("market_1", "cauldron_1").unwrap();
        assert!((forward - 45.0).abs() < 1e-12);
        assert!((forward - back).abs() < 1e-12);
    }

    #[test]
    fn test_disconnected_pair_is_not_found() {
        let registry = Registry::from_background(BackgroundData::sample()).unwrap();
        let err = registry.get_edge_time("cauldron_1", "cauldron_2").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_non_positive_capacity_rejected() {
        let mut bg = BackgroundData::sample();
        bg.cauldrons[0].max_volume = 0.0;
        let err = Registry::from_background(bg).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_edge_to_unknown_node_rejected() {
        let mut bg = BackgroundData::sample();
        bg.network.edges.push(RouteEdge {
            from: "cauldron_1".to_string(),
            to: "cauldron_ghost".to_string(),
            travel_time_minutes: 10.0,
        });
        let err = Registry::from_background(bg).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_non_positive_travel_time_rejected() {
        let mut bg = BackgroundData::sample();
        bg.network.edges[0].travel_time_minutes = -5.0;
        let err = Registry::from_background(bg).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_unreachable_depot_rejected() {
        let mut bg = BackgroundData::sample();
        // Orphan cauldron_2 by removing its only edge.
        bg.network.edges.retain(|e| e.from != "cauldron_2" && e.to != "cauldron_2");
        let err = Registry::from_background(bg).unwrap_err();
        match err {
            EngineError::Config(msg) => assert!(msg.contains("cauldron_2")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_cauldron_rejected() {
        let mut bg = BackgroundData::sample();
        let dup = bg.cauldrons[0].clone();
        bg.cauldrons.push(dup);
        assert!(matches!(
            Registry::from_background(bg),
            Err(EngineError::Config(_))
        ));
    }
}
