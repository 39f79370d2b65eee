//! Gantry - goal-driven task execution agent
//!
//! CLI entry point for planning, running, and supervising tasks.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use gantryd::cli::{Cli, Command};
use gantryd::config::Config;
use gantryd::domain::{StepState, Task, TaskState};
use gantryd::engine::{RecoveryController, StepExecutor, TaskEngine, TaskRunner};
use gantryd::guard::{AuthorizationGate, LlmRiskJudge, PermissionPolicy, TerminalPrompt};
use gantryd::llm::AnthropicClient;
use gantryd::planner::{LlmPlanner, Planner};
use gantryd::skills::SkillRegistry;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gantry")
        .join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) if other != "INFO" => {
            eprintln!("Warning: Unknown log-level '{other}', defaulting to INFO");
            tracing::Level::INFO
        }
        _ => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("gantry.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan { goal } => cmd_plan(&config, &goal).await,
        Command::Run {
            task_id,
            non_interactive,
        } => cmd_run(&config, &task_id, non_interactive).await,
        Command::Go {
            goal,
            non_interactive,
        } => cmd_go(&config, &goal, non_interactive).await,
        Command::Approve { task_id, step_id } => cmd_approve(&config, &task_id, &step_id),
        Command::Status { task_id } => cmd_status(&config, &task_id),
        Command::List => cmd_list(&config),
        Command::Cancel { task_id } => cmd_cancel(&config, &task_id),
        Command::Skills => cmd_skills(),
    }
}

fn open_engine(config: &Config) -> Result<Arc<TaskEngine>> {
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
    Ok(Arc::new(TaskEngine::open(data_dir)?))
}

fn build_planner(config: &Config, registry: Arc<SkillRegistry>) -> Result<Arc<dyn Planner>> {
    config.validate_llm()?;
    let client = Arc::new(AnthropicClient::from_config(&config.llm)?);
    Ok(Arc::new(LlmPlanner::new(client, registry)))
}

fn build_runner(config: &Config, engine: Arc<TaskEngine>, non_interactive: bool) -> Result<TaskRunner> {
    let registry = Arc::new(SkillRegistry::with_builtins());
    let executor = Arc::new(StepExecutor::new(registry.clone()));
    let planner = build_planner(config, registry)?;

    let policy = PermissionPolicy::default().with_overrides(&config.permissions);
    let mut gate = AuthorizationGate::new(policy, config.safe_mode);
    if config.guard.enabled {
        let client = Arc::new(AnthropicClient::from_config(&config.llm)?);
        gate = gate.with_judge(Arc::new(LlmRiskJudge::new(client)), config.guard.fail_open);
    }
    if !non_interactive {
        gate = gate.with_prompt(Arc::new(TerminalPrompt));
    }

    let recovery = RecoveryController::new(executor.clone(), planner);
    Ok(TaskRunner::new(
        engine,
        executor,
        gate,
        recovery,
        Duration::from_millis(config.engine.poll_interval_ms),
        Duration::from_millis(config.engine.step_delay_ms),
    ))
}

/// Resolve a task id or unique id prefix
fn resolve_task_id(engine: &TaskEngine, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let tasks = engine.list_tasks()?;
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id.to_string().starts_with(input))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id),
        [] => Err(eyre::eyre!("No task matches '{input}'")),
        _ => Err(eyre::eyre!("'{input}' is ambiguous; use a longer prefix")),
    }
}

async fn cmd_plan(config: &Config, goal: &str) -> Result<()> {
    let engine = open_engine(config)?;
    let registry = Arc::new(SkillRegistry::with_builtins());
    let planner = build_planner(config, registry)?;

    println!("Planning: {goal}");
    let steps = planner.plan(goal).await?;
    let task = engine.create_task(goal, steps)?;

    println!("\nTask {}", task.id.to_string().bold());
    print_steps(&task);
    println!("\nRun it with: gd run {}", short_id(&task.id));
    Ok(())
}

async fn cmd_run(config: &Config, task_id: &str, non_interactive: bool) -> Result<()> {
    let engine = open_engine(config)?;
    let id = resolve_task_id(&engine, task_id)?;
    let runner = build_runner(config, engine.clone(), non_interactive)?;

    let state = runner.run(&id).await?;
    let task = engine.load_task(&id)?;
    print_steps(&task);
    println!("\nTask {}: {}", short_id(&id), paint_task_state(state));
    Ok(())
}

async fn cmd_go(config: &Config, goal: &str, non_interactive: bool) -> Result<()> {
    let engine = open_engine(config)?;
    let registry = Arc::new(SkillRegistry::with_builtins());
    let planner = build_planner(config, registry)?;

    println!("Planning: {goal}");
    let steps = planner.plan(goal).await?;
    let task = engine.create_task(goal, steps)?;
    println!("Task {} planned with {} steps", short_id(&task.id), task.steps.len());

    let runner = build_runner(config, engine.clone(), non_interactive)?;
    let state = runner.run(&task.id).await?;
    let task = engine.load_task(&task.id)?;
    print_steps(&task);
    println!("\nTask {}: {}", short_id(&task.id), paint_task_state(state));
    Ok(())
}

fn cmd_approve(config: &Config, task_id: &str, step_id: &str) -> Result<()> {
    let engine = open_engine(config)?;
    let id = resolve_task_id(&engine, task_id)?;
    engine.approve_step(&id, step_id)?;
    println!("Approved step '{step_id}' of task {}", short_id(&id));
    Ok(())
}

fn cmd_status(config: &Config, task_id: &str) -> Result<()> {
    let engine = open_engine(config)?;
    let id = resolve_task_id(&engine, task_id)?;
    let task = engine.load_task(&id)?;

    println!("Task {}  {}", task.id.to_string().bold(), paint_task_state(task.state));
    println!("Goal: {}", task.goal);
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    print_steps(&task);

    if !task.artifacts.is_empty() {
        println!("\nArtifacts:");
        for artifact in &task.artifacts {
            match &artifact.path {
                Some(path) => println!("  {} ({})", artifact.name, path),
                None => println!("  {}", artifact.name),
            }
        }
    }
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let tasks = engine.list_tasks()?;
    if tasks.is_empty() {
        println!("No tasks. Create one with: gd plan \"<goal>\"");
        return Ok(());
    }
    for task in tasks {
        println!(
            "{}  {:<9}  {}",
            short_id(&task.id),
            paint_task_state(task.state),
            task.goal
        );
    }
    Ok(())
}

fn cmd_cancel(config: &Config, task_id: &str) -> Result<()> {
    let engine = open_engine(config)?;
    let id = resolve_task_id(&engine, task_id)?;
    let mut task = engine.load_task(&id)?;

    if task.state.is_terminal() {
        println!("Task {} is already {}", short_id(&id), task.state);
        return Ok(());
    }
    task.state = TaskState::Cancelled;
    engine.save_task(&mut task)?;
    println!("Cancelled task {}", short_id(&id));
    Ok(())
}

fn cmd_skills() -> Result<()> {
    let registry = SkillRegistry::with_builtins();
    println!("Available skills:\n");
    for name in registry.names() {
        let skill = registry.get(name).unwrap();
        println!("  {:<14} {}", name.bold(), skill.description());
        let permissions = skill.permissions().join(", ");
        println!("  {:<14} permissions: {permissions}", "");
    }
    Ok(())
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_steps(task: &Task) {
    println!("Steps:");
    for step in &task.steps {
        println!("  [{}] {} ({})", paint_step_state(step.state), step.id, step.skill_name);
        if let Some(error) = &step.error {
            println!("      {}", error.red());
        }
    }
}

fn paint_task_state(state: TaskState) -> colored::ColoredString {
    let text = state.to_string();
    match state {
        TaskState::Completed => text.green(),
        TaskState::Failed | TaskState::Cancelled => text.red(),
        TaskState::Running | TaskState::Blocked => text.yellow(),
        TaskState::Pending => text.normal(),
    }
}

fn paint_step_state(state: StepState) -> colored::ColoredString {
    let text = state.to_string();
    match state {
        StepState::Completed => text.green(),
        StepState::Failed => text.red(),
        StepState::Running | StepState::Blocked => text.yellow(),
        StepState::Skipped => text.dimmed(),
        StepState::Pending => text.normal(),
    }
}
