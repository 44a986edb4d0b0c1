//! Texler CLI: drives the sync engine from the command line.
//!
//! Lists the workspace catalog, creates workspaces and projects, pushes
//! local files into a project and compiles a project to a PDF on disk.
//! Credentials come from `--token`/`TEXLER_TOKEN` or an email/password
//! login.

mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use tokio::sync::mpsc;
use uuid::Uuid;

use surface::FileSurface;
use texler_sync::{
    CompileOutcome, CredentialGate, Engine, EngineConfig, EngineEvent, HttpRemote,
};

#[derive(Parser)]
#[command(name = "texler")]
#[command(about = "Sync and compile Texler LaTeX projects")]
struct Cli {
    /// Workspace API base URL (overrides TEXLER_API_URL)
    #[arg(long, value_name = "URL")]
    api: Option<String>,

    /// Bearer token (defaults to TEXLER_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Sign in with this email instead of a token
    #[arg(long, requires = "password")]
    email: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List workspaces and their projects
    Workspaces,
    /// Create a workspace
    CreateWorkspace {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Create a project in a workspace
    CreateProject {
        #[arg(long)]
        workspace: Uuid,
        name: Option<String>,
    },
    /// Upload local files into a project
    Push {
        #[command(flatten)]
        target: Target,
        /// Local files; each is stored under its file name
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory prefix for the remote paths
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Compile a project and write the PDF
    Compile {
        #[command(flatten)]
        target: Target,
        /// Make this path the main file first
        #[arg(long)]
        main: Option<String>,
        #[arg(long, short, value_name = "FILE")]
        out: PathBuf,
    },
}

/// Project selection; the first workspace and project when omitted.
#[derive(clap::Args)]
struct Target {
    #[arg(long)]
    workspace: Option<Uuid>,
    #[arg(long, requires = "workspace")]
    project: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(api) = cli.api {
        config.api_base_url = api.trim_end_matches('/').to_string();
    }
    // One-shot commands compile explicitly.
    config.auto_compile = false;

    let gate = Arc::new(CredentialGate::new());
    let remote = Arc::new(HttpRemote::new(config.clone(), gate.clone())?);

    match (cli.email, cli.password) {
        (Some(email), Some(password)) => remote
            .login(&email, &password)
            .await
            .context("Sign-in failed")?,
        _ => {
            let token = cli
                .token
                .or_else(|| std::env::var("TEXLER_TOKEN").ok())
                .ok_or_else(|| anyhow!("No credential: pass --token, set TEXLER_TOKEN or use --email/--password"))?;
            gate.set_token(token);
        }
    }

    let surface = Arc::new(FileSurface::in_temp_dir()?);
    let mut engine = Engine::new(config, remote, gate, surface.clone());
    let mut events = engine
        .take_event_rx()
        .ok_or_else(|| anyhow!("Event receiver already taken"))?;

    let result = run(cli.command, &engine, &mut events, &surface).await;
    engine.shutdown();
    result
}

async fn run(
    command: Command,
    engine: &Engine,
    events: &mut mpsc::Receiver<EngineEvent>,
    surface: &FileSurface,
) -> anyhow::Result<()> {
    match command {
        Command::Workspaces => {
            let workspaces = engine.refresh_workspaces().await;
            if workspaces.is_empty() {
                println!("No workspaces");
            }
            for workspace in workspaces {
                println!("{}  {}", workspace.id, workspace.name);
                for project in &workspace.projects {
                    let main = project.main_file.as_deref().unwrap_or("-");
                    println!("  {}  {} (main: {main})", project.id, project.name);
                }
            }
        }
        Command::CreateWorkspace { name, description } => {
            let workspace = engine
                .create_workspace(&name, description.as_deref())
                .await?;
            println!("{}", workspace.id);
        }
        Command::CreateProject { workspace, name } => {
            let project = engine.create_project(workspace, name.as_deref()).await?;
            println!("{}", project.id);
        }
        Command::Push {
            target,
            files,
            prefix,
        } => {
            select(engine, &target).await?;
            for file in files {
                let content = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow!("Not a file name: {}", file.display()))?;
                let path = match &prefix {
                    Some(prefix) => format!("{}/{name}", prefix.trim_end_matches('/')),
                    None => name.to_string(),
                };
                push(engine, events, &path, &content).await?;
                println!("pushed {path}");
            }
        }
        Command::Compile {
            target,
            main,
            out,
        } => {
            select(engine, &target).await?;
            if let Some(main) = main {
                engine.set_main_path(&main)?;
            }
            match engine.compile_now().await {
                CompileOutcome::Rendered(artifact) => {
                    std::fs::copy(surface.path_for(artifact.preview_id), &out)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    println!("wrote {} ({} bytes)", out.display(), artifact.len);
                }
                CompileOutcome::Failed(e) => bail!("Compilation failed: {e}"),
                CompileOutcome::Unreachable(e) => bail!("Compile service unreachable: {e}"),
                CompileOutcome::NotCompilable => bail!("Project has no usable main file"),
                CompileOutcome::Unauthorized => bail!("Credential rejected"),
                CompileOutcome::Stale => bail!("Compile superseded"),
            }
        }
    }
    Ok(())
}

async fn select(engine: &Engine, target: &Target) -> anyhow::Result<()> {
    match (target.workspace, target.project) {
        (Some(workspace), Some(project)) => {
            engine.refresh_workspaces().await;
            engine.open_project(workspace, project).await?;
        }
        (Some(workspace), None) => {
            engine.refresh_workspaces().await;
            engine.select_workspace(workspace).await?;
        }
        _ => engine.bootstrap().await?,
    }

    let state = engine.state();
    if !state.is_ready() {
        bail!("No project selected");
    }
    info!(
        "Using project {} in {}",
        state.project_name().unwrap_or("?"),
        state.workspace_name().unwrap_or("?")
    );
    Ok(())
}

/// Create or overwrite `path` and wait until the remote acknowledged it.
async fn push(
    engine: &Engine,
    events: &mut mpsc::Receiver<EngineEvent>,
    path: &str,
    content: &str,
) -> anyhow::Result<()> {
    if engine.state().file(path).is_some() {
        engine.update_file(path, content);
        engine.flush(path).await?;
        return Ok(());
    }

    engine.add_file(path, content)?;
    let timeout = engine.config().request_timeout + Duration::from_secs(1);
    tokio::time::timeout(timeout, async {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Saved { path: saved } if saved == path => return Ok(()),
                EngineEvent::SaveFailed { path: failed, error } if failed == path => {
                    return Err(anyhow!(error))
                }
                _ => {}
            }
        }
        Err(anyhow!("Engine stopped"))
    })
    .await
    .with_context(|| format!("Timed out creating {path}"))?
}
