//! agent-body binary
//!
//! Runs one agent session against the headless sandbox engine and keeps it
//! alive until Ctrl-C, optionally walking to a point or exploring.
//!
//! ## Configuration (TOML / env via `config` crate, then CLI flags)
//!
//! | Flag                 | Env                        | Config key                     |
//! |----------------------|----------------------------|--------------------------------|
//! | `--ws-url`           | `AGENT_WS_URL`             | `connect.ws_url`               |
//! | `--world-id`         | `AGENT_WORLD_ID`           | `connect.world_id`             |
//! | `--auth-token`       | `AGENT_AUTH_TOKEN`         | `connect.auth_token`           |
//! | `--environment-url`  | `AGENT_ENVIRONMENT_URL`    | `connect.environment_url`      |
//! | `--name`             | `AGENT_NAME`               | `connect.identity.name`        |
//! | `--tick-rate-hz`     | `AGENT_TICK_RATE_HZ`       | `runtime.tick_rate_hz`         |
//! | `--walk-interval-ms` | `AGENT_WALK_INTERVAL_MS`   | `random_walk.interval_ms`      |
//! | `--walk-radius`      | `AGENT_WALK_RADIUS`        | `random_walk.max_distance`     |
//!
//! Any config key can also be set as `AGENT_<SECTION>__<KEY>`.

use agent_body::physics::{MeshGeometry, ModelNode};
use agent_body::settings::validate;
use agent_body::sim::{SimConfig, SimEngineFactory, SimEntity, SimLoader};
use agent_body::{load_config, AgentConfig, AgentLink};
use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Built-in environment model served by the sandbox loader.
const SANDBOX_ENVIRONMENT: &str = "sandbox://environment";

const STATS_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "agent-body", about = "Agent Body – persistent avatar session", version)]
struct Args {
    /// TOML config file
    #[arg(long, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Websocket endpoint of the simulation server
    #[arg(long, env = "AGENT_WS_URL")]
    ws_url: Option<String>,

    /// World / session to join
    #[arg(long, env = "AGENT_WORLD_ID")]
    world_id: Option<String>,

    /// Bearer token handed to engine init
    #[arg(long, env = "AGENT_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// World tick rate (Hz)
    #[arg(long, env = "AGENT_TICK_RATE_HZ")]
    tick_rate_hz: Option<f32>,

    /// Environment model registered as static collision geometry
    #[arg(long, env = "AGENT_ENVIRONMENT_URL")]
    environment_url: Option<String>,

    /// Display name announced for the avatar
    #[arg(long, env = "AGENT_NAME")]
    name: Option<String>,

    /// Explore by random walk after connecting
    #[arg(long)]
    random_walk: bool,

    /// Pause between random-walk legs (ms)
    #[arg(long, env = "AGENT_WALK_INTERVAL_MS")]
    walk_interval_ms: Option<u64>,

    /// Random-walk radius (world units)
    #[arg(long, env = "AGENT_WALK_RADIUS")]
    walk_radius: Option<f32>,

    /// Walk to a ground-plane point, e.g. `--goto 12.5,-4`
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    goto: Option<(f32, f32)>,
}

impl Args {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(ws_url) = &self.ws_url {
            config.connect.ws_url = ws_url.clone();
        }
        if let Some(world_id) = &self.world_id {
            config.connect.world_id = world_id.clone();
        }
        if let Some(token) = &self.auth_token {
            config.connect.auth_token = Some(token.clone());
        }
        if let Some(url) = &self.environment_url {
            config.connect.environment_url = Some(url.clone());
        }
        if let Some(name) = &self.name {
            config.connect.identity.name = name.clone();
        }
        if let Some(hz) = self.tick_rate_hz {
            config.runtime.tick_rate_hz = hz;
        }
        if let Some(ms) = self.walk_interval_ms {
            config.random_walk.interval_ms = ms;
        }
        if let Some(radius) = self.walk_radius {
            config.random_walk.max_distance = radius;
        }
    }
}

fn parse_point(s: &str) -> std::result::Result<(f32, f32), String> {
    let (x, z) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Z, got '{}'", s))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad X '{}': {}", x, e))?;
    let z: f32 = z.trim().parse().map_err(|e| format!("bad Z '{}': {}", z, e))?;
    Ok((x, z))
}

// ---------------------------------------------------------------------------
// Sandbox world
// ---------------------------------------------------------------------------

fn quad(size: f32) -> MeshGeometry {
    let h = size / 2.0;
    MeshGeometry {
        vertices: vec![[-h, 0.0, -h], [h, 0.0, -h], [h, 0.0, h], [-h, 0.0, h]],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// A ground plane with two walls.
fn sandbox_environment() -> ModelNode {
    ModelNode::group("environment")
        .with_child(ModelNode::mesh("ground", quad(100.0)))
        .with_child(
            ModelNode::group("walls")
                .with_translation(Vec3::new(0.0, 0.0, -20.0))
                .with_child(ModelNode::mesh("wall-north", quad(10.0)).with_scale(Vec3::new(2.0, 1.0, 0.2)))
                .with_child(
                    ModelNode::mesh("wall-east", quad(10.0))
                        .with_translation(Vec3::new(20.0, 0.0, 20.0))
                        .with_scale(Vec3::new(0.2, 1.0, 2.0)),
                ),
        )
}

fn sandbox_residents() -> Vec<SimEntity> {
    vec![
        SimEntity::player("player-1", "Ada").at(Vec3::new(3.0, 0.0, -2.0)),
        SimEntity::player("player-2", "Grace").at(Vec3::new(-6.0, 0.0, 4.0)),
        SimEntity::new("prop-1", "crate").at(Vec3::new(1.0, 0.0, 8.0)).data_only(),
    ]
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agent_body=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    validate(&config).context("Invalid command-line override")?;
    if config.connect.environment_url.is_none() {
        config.connect.environment_url = Some(SANDBOX_ENVIRONMENT.into());
    }

    log::info!(
        "Starting agent-body (world='{}', name='{}', tick={}Hz)",
        config.connect.world_id,
        config.connect.identity.name,
        config.runtime.tick_rate_hz,
    );

    let loader = Arc::new(SimLoader::new().with_model(SANDBOX_ENVIRONMENT, sandbox_environment()));
    let factory = Arc::new(SimEngineFactory::new(SimConfig {
        initial_entities: sandbox_residents(),
        session_delay_ticks: 15,
        ..Default::default()
    }));

    let link = AgentLink::new(factory, loader);
    link.connect(config).await.context("Failed to connect agent session")?;

    if let Some((x, z)) = args.goto {
        let nav = link.clone();
        tokio::spawn(async move {
            match nav.goto(x, z).await {
                Ok(outcome) => log::info!("goto({}, {}) finished: {:?}", x, z, outcome),
                Err(e) => log::warn!("goto({}, {}) failed: {}", x, z, e),
            }
        });
    } else if args.random_walk {
        link.start_random_walk(None, None)
            .context("Failed to start random walk")?;
    }

    // -----------------------------------------------------------------------
    // Run until shutdown
    // -----------------------------------------------------------------------

    let mut report = tokio::time::interval(STATS_INTERVAL);
    loop {
        tokio::select! {
            _ = report.tick() => {
                let Some(stats) = link.stats() else {
                    log::warn!("Session ended: {:?}", link.status().last_error);
                    break;
                };
                log::info!("Session stats: {}", serde_json::to_string(&stats)?);
                if let Some(pose) = link.agent_pose() {
                    log::debug!("Agent at {:?}", pose.position);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("agent-body shutting down (SIGINT)");
                break;
            }
        }
    }

    link.disconnect().await;
    Ok(())
}
