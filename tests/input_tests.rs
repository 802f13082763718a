//! Input emulation tests

#[cfg(test)]
mod tests {
    use agent_body::input::{ButtonState, InputEmulation, MovementKey};

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    #[test]
    fn press_sets_pressed_edge_and_level() {
        let input = InputEmulation::new();
        input.set_key("keyW", true);
        assert_eq!(
            input.button("keyW"),
            ButtonState {
                down: true,
                pressed: true,
                released: false
            }
        );
    }

    #[test]
    fn release_sets_released_edge_and_clears_pressed() {
        let input = InputEmulation::new();
        input.set_key("keyW", true);
        input.set_key("keyW", false);
        assert_eq!(
            input.button("keyW"),
            ButtonState {
                down: false,
                pressed: false,
                released: true
            }
        );
    }

    #[test]
    fn repeated_down_does_not_retrigger_edge() {
        let input = InputEmulation::new();
        input.set_key("keyA", true);
        input.end_frame();
        input.set_key("keyA", true);
        let state = input.button("keyA");
        assert!(state.down);
        assert!(!state.pressed);
    }

    #[test]
    fn end_frame_clears_edges_and_keeps_last_level() {
        let input = InputEmulation::new();
        let sequences: [(&str, &[bool]); 4] = [
            ("keyW", &[true]),
            ("keyS", &[true, false]),
            ("keyA", &[false, true, true, false, true]),
            ("keyD", &[false]),
        ];
        for (name, seq) in &sequences {
            for &down in seq.iter() {
                input.set_key(name, down);
            }
        }

        input.end_frame();

        for (name, seq) in &sequences {
            let state = input.button(name);
            assert!(!state.pressed, "{} pressed survived end_frame", name);
            assert!(!state.released, "{} released survived end_frame", name);
            assert_eq!(state.down, *seq.last().unwrap(), "{} level", name);
        }
    }

    // -----------------------------------------------------------------------
    // Unknown names
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_names_are_created_lazily() {
        let input = InputEmulation::new();
        assert_eq!(input.button("jump"), ButtonState::default());
        assert!(input.snapshot().contains_key("jump"));

        input.set_key("crouch", false);
        assert_eq!(input.button("crouch"), ButtonState::default());
    }

    // -----------------------------------------------------------------------
    // Movement helpers
    // -----------------------------------------------------------------------

    #[test]
    fn release_movement_only_touches_held_keys() {
        let input = InputEmulation::new();
        input.set_movement(MovementKey::Forward, true);
        input.set_movement(MovementKey::TurnLeft, true);
        input.end_frame();

        assert_eq!(input.release_movement(), 2);
        for key in MovementKey::ALL {
            assert!(!input.movement_down(key));
        }
        assert!(input.button("keyW").released);
        // Never held, so no release edge.
        assert!(!input.button("keyD").released);
        assert_eq!(input.release_movement(), 0);
    }

    #[test]
    fn movement_keys_map_to_engine_names() {
        assert_eq!(MovementKey::Forward.name(), "keyW");
        assert_eq!(MovementKey::Backward.name(), "keyS");
        assert_eq!(MovementKey::TurnLeft.name(), "keyA");
        assert_eq!(MovementKey::TurnRight.name(), "keyD");
    }
}
