//! Entity cache tests

#[cfg(test)]
mod tests {
    use agent_body::cache::{quat_from_value, vec3_from_value, EntityCache};
    use agent_body::engine::{EntityEvent, LiveEntity};
    use agent_body::sim::SimEntity;
    use glam::{Quat, Vec3};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ada() -> SimEntity {
        SimEntity::player("p1", "Ada").at(Vec3::new(1.0, 2.0, 3.0))
    }

    // -----------------------------------------------------------------------
    // Add / remove
    // -----------------------------------------------------------------------

    #[test]
    fn add_records_snapshot_and_player_name() {
        let cache = EntityCache::new();
        let snapshot = cache.add(&ada()).unwrap();

        assert_eq!(snapshot.kind, "player");
        assert_eq!(snapshot.position, [1.0, 2.0, 3.0]);
        assert_eq!(cache.names().get("p1").as_deref(), Some("Ada"));
    }

    #[test]
    fn add_keeps_existing_player_name() {
        let cache = EntityCache::new();
        cache.names().set("p1", "Lovelace");
        cache.add(&ada());
        assert_eq!(cache.names().get("p1").as_deref(), Some("Lovelace"));
    }

    #[test]
    fn non_players_are_not_name_mapped() {
        let cache = EntityCache::new();
        cache.add(&SimEntity::new("c1", "crate").named("Box"));
        assert!(cache.names().is_empty());
        assert_eq!(cache.resolve_name("c1", None).as_deref(), Some("Box"));
    }

    #[test]
    fn add_then_remove_clears_both_maps() {
        let cache = EntityCache::new();
        cache.add(&ada());
        cache.remove("p1");

        assert!(!cache.contains("p1"));
        assert!(!cache.names().contains("p1"));
        assert_eq!(cache.resolve_name("p1", None), None);
    }

    #[test]
    fn data_only_entities_are_extracted_from_the_record() {
        let cache = EntityCache::new();
        let entity = SimEntity::player("p2", "Grace")
            .at(Vec3::new(-4.0, 0.5, 9.0))
            .rotated(Quat::from_rotation_y(1.0))
            .data_only();
        assert_eq!(entity.kind(), None);

        let snapshot = cache.add(&entity).unwrap();
        let expected = Quat::from_rotation_y(1.0);
        assert_eq!(snapshot.kind, "player");
        assert_eq!(snapshot.name.as_deref(), Some("Grace"));
        assert_eq!(snapshot.position, [-4.0, 0.5, 9.0]);
        assert!((Quat::from_array(snapshot.rotation).dot(expected) - 1.0).abs() < 1e-5);
    }

    // -----------------------------------------------------------------------
    // Modify
    // -----------------------------------------------------------------------

    #[test]
    fn modify_without_live_object_merges_changed_fields() {
        let cache = EntityCache::new();
        cache.add(&ada());

        let updated = cache
            .modify("p1", &json!({ "name": "Countess" }), None)
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Countess"));
        assert_eq!(updated.position, [1.0, 2.0, 3.0]);
        assert_eq!(cache.names().get("p1").as_deref(), Some("Countess"));
    }

    #[test]
    fn modify_without_live_object_accepts_object_positions() {
        let cache = EntityCache::new();
        cache.add(&ada());
        let updated = cache
            .modify("p1", &json!({ "position": { "x": 5, "y": 0, "z": -5 } }), None)
            .unwrap();
        assert_eq!(updated.position, [5.0, 0.0, -5.0]);
        assert_eq!(updated.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn modify_with_live_object_reextracts() {
        let cache = EntityCache::new();
        cache.add(&ada());

        let moved = ada().at(Vec3::new(10.0, 0.0, 10.0));
        let updated = cache.modify("p1", &json!({ "position": [10, 0, 10] }), Some(&moved));
        assert_eq!(updated.unwrap().position, [10.0, 0.0, 10.0]);
    }

    #[test]
    fn late_modify_for_unknown_entity_is_ignored() {
        let cache = EntityCache::new();
        cache.add(&ada());
        cache.remove("p1");

        assert!(cache.modify("p1", &json!({ "name": "Ghost" }), None).is_none());
        assert!(!cache.contains("p1"));
        assert!(!cache.names().contains("p1"));
    }

    // -----------------------------------------------------------------------
    // Name resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_name_prefers_map_then_snapshot_then_live() {
        let cache = EntityCache::new();
        let live = SimEntity::new("x", "npc").named("Live");
        assert_eq!(cache.resolve_name("x", Some(&live)).as_deref(), Some("Live"));

        cache.add(&SimEntity::new("x", "npc").named("Cached"));
        assert_eq!(cache.resolve_name("x", Some(&live)).as_deref(), Some("Cached"));

        cache.names().set("x", "Mapped");
        assert_eq!(cache.resolve_name("x", Some(&live)).as_deref(), Some("Mapped"));
    }

    // -----------------------------------------------------------------------
    // Events and resync
    // -----------------------------------------------------------------------

    #[test]
    fn apply_routes_events() {
        let cache = EntityCache::new();
        cache.apply(&EntityEvent::Added(Arc::new(ada())));
        assert!(cache.contains("p1"));

        cache.apply(&EntityEvent::Modified {
            id: "p1".into(),
            changes: json!({ "position": [0, 0, 7] }),
            live: None,
        });
        assert_eq!(cache.get("p1").unwrap().position, [0.0, 0.0, 7.0]);

        cache.apply(&EntityEvent::Removed { id: "p1".into() });
        assert!(cache.is_empty());
    }

    #[test]
    fn retain_live_prunes_stale_entities() {
        let cache = EntityCache::new();
        cache.add(&ada());
        cache.add(&SimEntity::player("p2", "Grace"));
        cache.add(&SimEntity::new("c1", "crate"));

        let live: HashSet<String> = ["p2".to_string()].into_iter().collect();
        assert_eq!(cache.retain_live(&live), 2);
        assert_eq!(cache.len(), 1);
        assert!(!cache.names().contains("p1"));
        assert!(cache.names().contains("p2"));
    }

    // -----------------------------------------------------------------------
    // Value parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_array_and_object_forms() {
        assert_eq!(vec3_from_value(&json!([1, 2, 3])), Some([1.0, 2.0, 3.0]));
        assert_eq!(vec3_from_value(&json!({ "x": 1.5, "y": 0, "z": 2 })), Some([1.5, 0.0, 2.0]));
        assert_eq!(vec3_from_value(&json!([1, 2])), None);
        assert_eq!(vec3_from_value(&json!({ "x": 1, "y": "a", "z": 2 })), None);
        assert_eq!(quat_from_value(&json!([0, 0, 0, 1])), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(quat_from_value(&json!({ "x": 0, "y": 1, "z": 0 })), None);
    }
}
