//! Manipulation goal server.
//!
//! Serves "move to predefined pose" goals over HTTP against the simulated
//! planning backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use manipulation_server::config::{parse_group_timeout, parse_timeout_secs};
use manipulation_server::{
    http, AdmissionPolicy, AppState, Config, GoalLifecycleManager, SelectionOrder,
    SimulatedPlanner,
};

/// Goal server moving robot groups to their predefined poses.
#[derive(Parser, Debug)]
#[command(name = "manipulation-server", about = "Move-to-predefined-pose goal server")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:50061")]
    http_addr: String,

    /// Robot model descriptor
    #[arg(long, default_value = "robot_description")]
    robot_model: String,

    /// Groups goals may name (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "arm_torso,gripper")]
    groups: Vec<String>,

    /// Move stage timeout in seconds
    #[arg(long = "stage-timeout-secs", default_value = "8.0", value_parser = parse_timeout_secs)]
    stage_timeout: Duration,

    /// Per-group move stage timeout, as GROUP=SECONDS (repeatable)
    #[arg(long = "group-timeout", value_parser = parse_group_timeout)]
    group_timeouts: Vec<(String, Duration)>,

    /// Planning attempts per goal
    #[arg(long, default_value = "5")]
    max_planning_attempts: u32,

    /// Solution selection order (highest-cost or lowest-cost)
    #[arg(long, default_value = "highest-cost")]
    selection_order: SelectionOrder,

    /// Admission policy (queue or reject-when-busy)
    #[arg(long, default_value = "queue")]
    admission_policy: AdmissionPolicy,

    /// Goal flows allowed in flight at once
    #[arg(long, default_value = "4")]
    max_concurrent_goals: usize,

    /// Finished goals kept for result lookups
    #[arg(long, default_value = "256")]
    result_retention: usize,

    /// Simulated planning time in milliseconds
    #[arg(long, default_value = "200")]
    sim_planning_delay_ms: u64,

    /// Simulated motion time in milliseconds
    #[arg(long, default_value = "1000")]
    sim_execution_delay_ms: u64,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            http_addr: self.http_addr,
            robot_model: self.robot_model,
            known_groups: self.groups,
            stage_timeout: self.stage_timeout,
            group_timeouts: self.group_timeouts.into_iter().collect(),
            max_planning_attempts: self.max_planning_attempts,
            selection_order: self.selection_order,
            admission_policy: self.admission_policy,
            max_concurrent_goals: self.max_concurrent_goals,
            result_retention: self.result_retention,
            sim_planning_delay: Duration::from_millis(self.sim_planning_delay_ms),
            sim_execution_delay: Duration::from_millis(self.sim_execution_delay_ms),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("manipulation_server=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let http_addr: SocketAddr = config.http_addr.parse()?;

    let planner = SimulatedPlanner::new()
        .with_planning_delay(config.sim_planning_delay)
        .with_execution_delay(config.sim_execution_delay);
    let state = AppState::with_retention(config.result_retention);
    let manager = GoalLifecycleManager::new(&config, state.clone(), Arc::new(planner));
    manager.configure().await?;

    info!(
        http_addr = %http_addr,
        selection = %config.selection_order,
        admission = %config.admission_policy,
        attempts = config.max_planning_attempts,
        "Starting manipulation goal server"
    );

    // Log goal events
    let mut events = state.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(
                    goal_id = %event.goal_id,
                    event = ?event.event_type,
                    metadata = ?event.metadata,
                    "Goal event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Goal event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);
    axum::serve(listener, http::create_router(manager))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Manipulation goal server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
