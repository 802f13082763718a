//! Navigation controller tests

#[cfg(test)]
mod tests {
    use agent_body::engine::AgentBody;
    use agent_body::input::{InputEmulation, MovementKey};
    use agent_body::navigation::{
        sample_walk_target, signed_angle, steer, validate_pose, LegOutcome, Navigator, Turn,
    };
    use agent_body::sim::{drive_body, Locomotion, SimBody};
    use agent_body::types::{NavigationConfig, NavigationTarget, Pose, TurnStrategy};
    use agent_body::AgentError;
    use glam::{Quat, Vec2, Vec3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout, Instant};
    use tokio_test::{assert_err, assert_ok};

    fn navigator_with(config: NavigationConfig, pose: Pose) -> (Navigator, Arc<InputEmulation>, Arc<SimBody>) {
        let input = Arc::new(InputEmulation::new());
        let body = Arc::new(SimBody::new(pose));
        let nav = Navigator::new(input.clone(), body.clone(), config);
        (nav, input, body)
    }

    fn navigator() -> (Navigator, Arc<InputEmulation>, Arc<SimBody>) {
        navigator_with(
            NavigationConfig::default(),
            Pose::new(Vec3::ZERO, Quat::IDENTITY),
        )
    }

    fn held(input: &InputEmulation) -> Vec<MovementKey> {
        MovementKey::ALL
            .into_iter()
            .filter(|k| input.movement_down(*k))
            .collect()
    }

    /// Lets spawned legs run their first step.
    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    struct NoBody;

    impl AgentBody for NoBody {
        fn pose(&self) -> Option<Pose> {
            None
        }

        fn set_rotation(&self, _rotation: Quat) {}
    }

    // -----------------------------------------------------------------------
    // Steering math
    // -----------------------------------------------------------------------

    #[test]
    fn signed_angle_is_positive_to_the_left() {
        let forward = Vec2::new(0.0, -1.0);
        let left = Vec2::new(-1.0, 0.0);
        let right = Vec2::new(1.0, 0.0);
        assert!((signed_angle(forward, left) - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!((signed_angle(forward, right) + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!(signed_angle(forward, forward).abs() < 1e-6);
    }

    #[test]
    fn steer_thresholds() {
        let config = NavigationConfig::default();
        let pose = Pose::new(Vec3::ZERO, Quat::IDENTITY);

        // Dead ahead.
        let s = steer(&pose, NavigationTarget::new(0.0, -10.0), &config);
        assert!(s.forward);
        assert_eq!(s.turn, None);

        // ~27° to the right: walk and nudge.
        let s = steer(&pose, NavigationTarget::new(5.0, -10.0), &config);
        assert!(s.forward);
        assert_eq!(s.turn, Some(Turn::Right));

        // 90° to the left: turn in place.
        let s = steer(&pose, NavigationTarget::new(-10.0, 0.0), &config);
        assert!(!s.forward);
        assert_eq!(s.turn, Some(Turn::Left));

        // Behind.
        let s = steer(&pose, NavigationTarget::new(1.0, 10.0), &config);
        assert!(!s.forward);
        assert!(s.turn.is_some());
    }

    #[test]
    fn steer_holds_on_degenerate_vectors() {
        let config = NavigationConfig::default();
        let pose = Pose::new(Vec3::ZERO, Quat::IDENTITY);
        let s = steer(&pose, NavigationTarget::new(0.0, 0.0), &config);
        assert!(!s.forward && s.turn.is_none());

        // Facing straight up: no planar forward.
        let up = Pose::new(Vec3::ZERO, Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        let s = steer(&up, NavigationTarget::new(10.0, 0.0), &config);
        assert!(!s.forward && s.turn.is_none());
    }

    #[test]
    fn snap_strategy_faces_heading() {
        let config = NavigationConfig {
            strategy: TurnStrategy::Snap,
            ..Default::default()
        };
        let pose = Pose::new(Vec3::ZERO, Quat::IDENTITY);
        let s = steer(&pose, NavigationTarget::new(10.0, 0.0), &config);
        assert!(s.forward);
        assert_eq!(s.turn, None);
        let forward = Pose::new(Vec3::ZERO, s.face.unwrap()).forward();
        assert!((forward - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn validate_pose_renormalizes_drift_and_rejects_nan() {
        let drifted = Pose::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0));
        let (pose, renormalized) = validate_pose(drifted).unwrap();
        assert!(renormalized);
        assert!((pose.rotation.length() - 1.0).abs() < 1e-6);

        let slight = Pose::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 1.005));
        assert!(!validate_pose(slight).unwrap().1);

        assert!(validate_pose(Pose::new(Vec3::NAN, Quat::IDENTITY)).is_none());
        assert!(validate_pose(Pose::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0))).is_none());
    }

    #[test]
    fn walk_targets_stay_within_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        let origin = Vec3::new(3.0, 1.0, -2.0);
        for _ in 0..1000 {
            let t = sample_walk_target(&mut rng, origin, 7.0);
            let d = Vec2::new(t.x - origin.x, t.z - origin.z).length();
            assert!(d > 0.0 && d <= 7.0 + 1e-4, "distance {}", d);
        }
    }

    // -----------------------------------------------------------------------
    // Single leg
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn goto_within_stop_distance_arrives_immediately() {
        let (nav, input, _body) = navigator();
        input.set_movement(MovementKey::Forward, true);

        let started = Instant::now();
        let outcome = assert_ok!(nav.goto(0.5, 0.5).await);

        assert_eq!(outcome, LegOutcome::Arrived);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(held(&input).is_empty());
        assert!(!nav.is_navigating());
        assert_eq!(nav.target(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_goto_supersedes_first() {
        let (nav, input, _body) = navigator();

        let first = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(50.0, 0.0).await }
        });
        settle().await;
        assert_eq!(held(&input), vec![MovementKey::TurnRight]);

        let second = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(-50.0, 0.0).await }
        });
        settle().await;

        assert_eq!(assert_ok!(first.await.unwrap()), LegOutcome::Cancelled);
        assert_eq!(nav.target(), Some(NavigationTarget::new(-50.0, 0.0)));
        assert_eq!(held(&input), vec![MovementKey::TurnLeft]);

        nav.stop_navigation("test over");
        assert_eq!(assert_ok!(second.await.unwrap()), LegOutcome::Cancelled);
        assert!(held(&input).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_navigation_without_leg_is_noop() {
        let (nav, input, _body) = navigator();
        nav.stop_navigation("nothing to stop");
        nav.stop_navigation("still nothing");
        assert!(!nav.is_navigating());
        assert!(held(&input).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_navigation_releases_immediately() {
        let (nav, input, _body) = navigator();
        let leg = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(0.0, -40.0).await }
        });
        settle().await;
        assert_eq!(held(&input), vec![MovementKey::Forward]);

        nav.stop_navigation("halt");
        assert!(held(&input).is_empty());
        assert!(input.button("keyW").released);
        assert_eq!(assert_ok!(leg.await.unwrap()), LegOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn goto_without_body_fails_fast() {
        let input = Arc::new(InputEmulation::new());
        let nav = Navigator::new(input, Arc::new(NoBody), NavigationConfig::default());
        let err = assert_err!(nav.goto(1.0, 1.0).await);
        assert!(matches!(err, AgentError::PrerequisiteMissing(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn goto_rejects_non_finite_target() {
        let (nav, _input, _body) = navigator();
        let err = assert_err!(nav.goto(f32::NAN, 0.0).await);
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_pose_force_stops_leg() {
        let (nav, input, body) = navigator();
        let leg = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(0.0, -40.0).await }
        });
        settle().await;

        body.set_pose(Pose::new(Vec3::new(f32::NAN, 0.0, 0.0), Quat::IDENTITY));
        sleep(Duration::from_millis(200)).await;

        assert!(matches!(assert_ok!(leg.await.unwrap()), LegOutcome::Stopped(_)));
        assert!(held(&input).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drifted_orientation_is_written_back_normalized() {
        let (nav, _input, body) = navigator_with(
            NavigationConfig::default(),
            Pose::new(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0)),
        );
        let leg = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(0.0, -40.0).await }
        });
        settle().await;

        assert!((body.current().rotation.length() - 1.0).abs() < 1e-5);
        nav.stop_navigation("done");
        let _ = leg.await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_leg_releases_its_inputs() {
        let (nav, input, _body) = navigator();
        let result = timeout(Duration::from_millis(250), nav.goto(0.0, -40.0)).await;
        assert!(result.is_err());
        assert!(!nav.is_navigating());
        assert!(held(&input).is_empty());
    }

    // -----------------------------------------------------------------------
    // Convergence
    // -----------------------------------------------------------------------

    async fn converge(strategy: TurnStrategy) {
        let config = NavigationConfig {
            strategy,
            ..Default::default()
        };
        let stop_distance = config.stop_distance;
        let (nav, input, body) = navigator_with(config, Pose::new(Vec3::ZERO, Quat::IDENTITY));

        let ticker = tokio::spawn({
            let input = input.clone();
            let body = body.clone();
            async move {
                let mut timer = tokio::time::interval(Duration::from_millis(50));
                loop {
                    timer.tick().await;
                    drive_body(&body, &input, 0.05, Locomotion::default());
                    input.end_frame();
                }
            }
        });

        let outcome = timeout(Duration::from_secs(30), nav.goto(50.0, 0.0))
            .await
            .expect("leg did not converge in 30s of simulated time");
        ticker.abort();

        assert_eq!(assert_ok!(outcome), LegOutcome::Arrived);
        let p = body.current().position;
        assert!(Vec2::new(p.x - 50.0, p.z).length() <= stop_distance);
        assert!(held(&input).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn straight_line_leg_converges_with_signed_angle() {
        converge(TurnStrategy::SignedAngle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn straight_line_leg_converges_with_snap() {
        converge(TurnStrategy::Snap).await;
    }

    // -----------------------------------------------------------------------
    // Random walk
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn random_walk_start_then_stop_leaves_nothing_behind() {
        let (nav, input, _body) = navigator();
        assert_ok!(nav.start_random_walk(Duration::from_millis(500), 5.0));
        sleep(Duration::from_millis(250)).await;
        assert!(nav.random_walk_active());

        nav.stop_random_walk();
        assert!(!nav.random_walk_active());
        assert!(!nav.is_navigating());
        assert!(held(&input).is_empty());

        sleep(Duration::from_secs(60)).await;
        assert!(!nav.is_navigating());
        assert!(held(&input).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_random_walk_replaces_previous() {
        let (nav, _input, _body) = navigator();
        assert_ok!(nav.start_random_walk(Duration::from_millis(500), 5.0));
        assert_ok!(nav.start_random_walk(Duration::from_millis(500), 5.0));
        assert!(nav.random_walk_active());
        nav.stop_random_walk();
        assert!(!nav.random_walk_active());
    }

    #[tokio::test(start_paused = true)]
    async fn goto_cancels_random_walk() {
        let (nav, _input, _body) = navigator();
        assert_ok!(nav.start_random_walk(Duration::from_millis(500), 5.0));
        settle().await;

        let leg = tokio::spawn({
            let nav = nav.clone();
            async move { nav.goto(0.0, -40.0).await }
        });
        settle().await;

        assert!(!nav.random_walk_active());
        assert_eq!(nav.target(), Some(NavigationTarget::new(0.0, -40.0)));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(nav.target(), Some(NavigationTarget::new(0.0, -40.0)));
        nav.stop_navigation("done");
        let _ = leg.await;
    }

    #[tokio::test(start_paused = true)]
    async fn random_walk_rejects_bad_radius() {
        let (nav, _input, _body) = navigator();
        assert_err!(nav.start_random_walk(Duration::from_millis(500), 0.0));
        assert_err!(nav.start_random_walk(Duration::from_millis(500), f32::INFINITY));
        assert!(!nav.random_walk_active());
    }
}
