//! manip - command line client for the manipulation goal server.

mod client;
mod error;

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use manipulation_core::{GoalRecord, GoalResult};

use client::{HttpClient, ResultPoll};

/// manip - Manipulation goal server client
#[derive(Parser)]
#[command(name = "manip")]
#[command(about = "CLI for the manipulation goal server", long_about = None)]
struct Cli {
    /// Goal server address
    #[arg(short, long, default_value = "http://127.0.0.1:50061")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a goal moving a group to its predefined pose
    Submit {
        /// Group to move (e.g. arm_torso, gripper)
        group: String,

        /// Wait for the goal's result
        #[arg(short, long)]
        wait: bool,

        /// Seconds to wait for the result
        #[arg(long, default_value = "120")]
        timeout_secs: u64,
    },

    /// Cancel a goal
    Cancel {
        /// Goal ID
        id: String,
    },

    /// Show a goal's result
    Result {
        /// Goal ID
        id: String,

        /// Seconds to wait if the goal is still running
        #[arg(long)]
        wait_secs: Option<u64>,
    },

    /// Show goal status
    Status {
        /// Goal ID
        id: String,
    },

    /// List tracked goals
    List,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = HttpClient::new(&cli.addr);

    match cli.command {
        Commands::Submit {
            group,
            wait,
            timeout_secs,
        } => {
            let goal_id = client.submit_goal(&group).await?;
            println!("Goal accepted: {}", goal_id);
            if wait {
                let poll = client
                    .get_result(goal_id.as_str(), Some(Duration::from_secs(timeout_secs)))
                    .await?;
                print_poll(&poll);
            }
        }
        Commands::Cancel { id } => {
            if client.cancel_goal(&id).await? {
                println!("Cancel accepted for {}", id);
            } else {
                println!("Cancel rejected for {} (unknown or already finished)", id);
            }
        }
        Commands::Result { id, wait_secs } => {
            let poll = client
                .get_result(&id, wait_secs.map(Duration::from_secs))
                .await?;
            print_poll(&poll);
        }
        Commands::Status { id } => {
            let record = client.get_goal(&id).await?;
            print_goal(&record);
        }
        Commands::List => {
            let goals = client.list_goals().await?;
            println!("Goals ({}):", goals.len());
            println!("{:<36}  {:<10}  {:<12}  {}", "ID", "STATUS", "GROUP", "SUBMITTED");
            println!("{}", "-".repeat(80));
            for goal in goals {
                println!(
                    "{:<36}  {:<10}  {:<12}  {}",
                    goal.goal_id.as_str(),
                    goal.status.as_str(),
                    goal.group_name,
                    format_timestamp(goal.submitted_at)
                );
            }
        }
        Commands::Health => {
            if client.health().await? {
                println!("ok");
            } else {
                println!("unhealthy");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_poll(poll: &ResultPoll) {
    match poll {
        ResultPoll::Finished(result) => print_result(result),
        ResultPoll::Pending(status) => println!("Goal still running ({})", status),
    }
}

fn print_result(result: &GoalResult) {
    println!("  Goal:       {}", result.goal_id);
    println!("  Success:    {}", result.success);
    println!("  Status:     {}", result.status);
    if let Some(reason) = result.reason {
        println!("  Reason:     {}", reason.as_str());
    }
    if let Some(message) = &result.message {
        println!("  Message:    {}", message);
    }
    println!("  Finished:   {}", format_timestamp(result.finished_at));
}

fn print_goal(goal: &GoalRecord) {
    println!("  ID:         {}", goal.goal_id);
    println!("  Group:      {}", goal.group_name);
    println!("  Status:     {}", goal.status);
    println!("  Submitted:  {}", format_timestamp(goal.submitted_at));
    if let Some(started) = goal.started_at {
        println!("  Started:    {}", format_timestamp(started));
    }
    if let Some(result) = &goal.result {
        println!("  Result:");
        print_result(result);
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
