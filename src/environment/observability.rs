//! Per-agent visibility filtering (§4.3, GLOSSARY "Observability level").

use uuid::Uuid;

use crate::domain::models::environment::{EnvironmentEvent, SoftwareLocation, SpatialEntity, VisibilityLevel};

/// The sensor radius used by the `Network` visibility level to decide which
/// entities "within range" are visible, independent of an explicit edge.
pub const DEFAULT_SENSOR_RADIUS: f64 = 50.0;

pub struct ObservabilityFilter {
    pub levels: std::collections::HashMap<Uuid, VisibilityLevel>,
}

impl Default for ObservabilityFilter {
    fn default() -> Self {
        Self { levels: std::collections::HashMap::new() }
    }
}

impl ObservabilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&mut self, agent_id: Uuid, level: VisibilityLevel) {
        self.levels.insert(agent_id, level);
    }

    pub fn level_for(&self, agent_id: Uuid) -> VisibilityLevel {
        self.levels.get(&agent_id).copied().unwrap_or(VisibilityLevel::Full)
    }

    /// Whether `viewer` can see `entity`, given the viewer's own location.
    pub fn can_see_entity(&self, viewer: Uuid, viewer_location: &SoftwareLocation, entity: &SpatialEntity) -> bool {
        if entity.id == viewer {
            return true;
        }
        match self.level_for(viewer) {
            VisibilityLevel::Full => true,
            VisibilityLevel::Namespace => entity.location.namespace_path == viewer_location.namespace_path,
            VisibilityLevel::Process => {
                entity.location.host == viewer_location.host
                    && entity.location.process_id == viewer_location.process_id
            }
            VisibilityLevel::Network => viewer_location.distance(&entity.location) <= DEFAULT_SENSOR_RADIUS,
            VisibilityLevel::None => false,
        }
    }

    pub fn filter_entities<'a>(
        &self,
        viewer: Uuid,
        viewer_location: &SoftwareLocation,
        entities: impl Iterator<Item = &'a SpatialEntity>,
    ) -> Vec<&'a SpatialEntity> {
        entities.filter(|e| self.can_see_entity(viewer, viewer_location, e)).collect()
    }

    pub fn can_see_event(&self, viewer: Uuid, viewer_location: &SoftwareLocation, source_location: Option<&SoftwareLocation>, event: &EnvironmentEvent) -> bool {
        if event.source_id == viewer {
            return true;
        }
        match self.level_for(viewer) {
            VisibilityLevel::Full => true,
            VisibilityLevel::None => false,
            level => match source_location {
                Some(loc) => match level {
                    VisibilityLevel::Namespace => loc.namespace_path == viewer_location.namespace_path,
                    VisibilityLevel::Process => loc.host == viewer_location.host && loc.process_id == viewer_location.process_id,
                    VisibilityLevel::Network => viewer_location.distance(loc) <= DEFAULT_SENSOR_RADIUS,
                    _ => false,
                },
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_level_sees_only_self() {
        let mut filter = ObservabilityFilter::new();
        let viewer = Uuid::new_v4();
        filter.set_level(viewer, VisibilityLevel::None);
        let viewer_loc = SoftwareLocation::new("host-1", 1, "/");

        let other = SpatialEntity { id: Uuid::new_v4(), name: "other".into(), location: viewer_loc.clone() };
        assert!(!filter.can_see_entity(viewer, &viewer_loc, &other));

        let me = SpatialEntity { id: viewer, name: "me".into(), location: viewer_loc.clone() };
        assert!(filter.can_see_entity(viewer, &viewer_loc, &me));
    }

    #[test]
    fn process_level_requires_same_host_and_pid() {
        let mut filter = ObservabilityFilter::new();
        let viewer = Uuid::new_v4();
        filter.set_level(viewer, VisibilityLevel::Process);
        let viewer_loc = SoftwareLocation::new("host-1", 10, "/");

        let same_process = SpatialEntity { id: Uuid::new_v4(), name: "a".into(), location: viewer_loc.clone() };
        assert!(filter.can_see_entity(viewer, &viewer_loc, &same_process));

        let other_process = SpatialEntity {
            id: Uuid::new_v4(),
            name: "b".into(),
            location: SoftwareLocation::new("host-1", 99, "/"),
        };
        assert!(!filter.can_see_entity(viewer, &viewer_loc, &other_process));
    }
}
