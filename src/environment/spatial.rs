//! Spatial model: entities (agents + logical services) connected by typed
//! edges, queried by radius and namespace membership (§4.3).

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::models::environment::{ConnectionKind, SoftwareLocation, SpatialEntity};

#[derive(Debug, Default)]
pub struct SpatialGraph {
    entities: HashMap<Uuid, SpatialEntity>,
    edges: Vec<(Uuid, Uuid, ConnectionKind)>,
}

impl SpatialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: SpatialEntity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn move_entity(&mut self, id: Uuid, new_location: SoftwareLocation) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.location = new_location;
                true
            }
            None => false,
        }
    }

    pub fn add_connection(&mut self, from: Uuid, to: Uuid, kind: ConnectionKind) {
        self.edges.push((from, to, kind));
    }

    pub fn entity(&self, id: Uuid) -> Option<&SpatialEntity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &SpatialEntity> {
        self.entities.values()
    }

    /// Entities directly connected to `id` via a network/coordination edge
    /// and within `radius` distance of its current location.
    pub fn neighbours_within_radius(&self, id: Uuid, radius: f64) -> Vec<&SpatialEntity> {
        let Some(origin) = self.entities.get(&id) else {
            return Vec::new();
        };
        let connected: std::collections::HashSet<Uuid> = self
            .edges
            .iter()
            .filter_map(|(from, to, _)| {
                if *from == id {
                    Some(*to)
                } else if *to == id {
                    Some(*from)
                } else {
                    None
                }
            })
            .collect();

        self.entities
            .values()
            .filter(|entity| {
                entity.id != id
                    && connected.contains(&entity.id)
                    && origin.location.distance(&entity.location) <= radius
            })
            .collect()
    }

    pub fn entities_in_namespace(&self, namespace: &str) -> Vec<&SpatialEntity> {
        self.entities
            .values()
            .filter(|e| e.location.namespace_path == namespace)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: Uuid, host: &str) -> SpatialEntity {
        SpatialEntity { id, name: id.to_string(), location: SoftwareLocation::new(host, 1, "/") }
    }

    #[test]
    fn neighbours_respects_connection_and_radius() {
        let mut graph = SpatialGraph::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        graph.add_entity(entity(a, "host-1"));
        graph.add_entity(entity(b, "host-1"));
        graph.add_entity(entity(c, "host-2"));
        graph.add_connection(a, b, ConnectionKind::Network);

        let neighbours = graph.neighbours_within_radius(a, 1000.0);
        assert_eq!(neighbours.len(), 1);
        assert_eq!(neighbours[0].id, b);
    }

    #[test]
    fn namespace_membership_filters_entities() {
        let mut graph = SpatialGraph::new();
        let a = Uuid::new_v4();
        let mut loc = SoftwareLocation::new("host-1", 1, "/");
        loc.namespace_path = "team-a".to_string();
        graph.add_entity(SpatialEntity { id: a, name: "a".to_string(), location: loc });

        assert_eq!(graph.entities_in_namespace("team-a").len(), 1);
        assert_eq!(graph.entities_in_namespace("team-b").len(), 0);
    }
}
