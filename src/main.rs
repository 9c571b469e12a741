use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dataworkspace_core::host::{FsFileProbe, JsonScratchStore, MemoryFolders, WorkspaceFile};
use dataworkspace_core::workspace::WorkspaceEvent;
use dataworkspace_core::{activate, Extension, HostServices, WorkspaceConfig, WorkspaceNotice};

#[derive(Parser, Debug)]
#[command(name = "dataworkspace", version, about = "Inspect and manage workspace projects")]
struct Cli {
    /// Config file (defaults to .dataworkspace.toml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Open folder; repeat for several
    #[arg(long = "folder", global = true)]
    folders: Vec<PathBuf>,

    /// JSON workspace file listing the open folders
    #[arg(long, global = true, conflicts_with = "folders")]
    workspace_file: Option<PathBuf>,

    /// Scratch list of temp projects
    #[arg(long, global = true)]
    scratch: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the project tree
    Tree,
    /// Report projects outside the workspace and untracked project files
    Check,
    /// Track an existing project file
    Open {
        path: PathBuf,
        #[arg(long = "type")]
        project_type: Option<String>,
    },
    /// Track a project as temp until it is promoted
    New {
        path: PathBuf,
        #[arg(long = "type")]
        project_type: Option<String>,
    },
    /// Stop tracking a project
    Remove { path: PathBuf },
    /// Commit a temp project
    Promote { path: PathBuf },
    /// Open the folders containing the given projects
    AddToWorkspace { paths: Vec<PathBuf> },
    /// Keep running and print the tree whenever it changes
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dataworkspace_core::util::init_logging(cli.json_logs);

    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let config = match &cli.config {
        Some(path) => WorkspaceConfig::load_file(path)?,
        None => WorkspaceConfig::load(&cwd)?,
    };

    let workspace_file = cli
        .workspace_file
        .as_ref()
        .map(|p| WorkspaceFile::open(absolute(&cwd, p)))
        .transpose()?;
    let host = build_host(&cli, &cwd, &config, workspace_file.clone())?;

    let mut ext = activate(host, &config);
    ext.wait_for_initialization().await;
    adopt_discovered(&ext).await;

    let result = run(&cli, &cwd, &ext, workspace_file).await;
    if let Err(e) = ext.service.save_scratch_now().await {
        warn!(error = %e, "Failed to save scratch list");
    }
    ext.deactivate();
    result
}

fn build_host(
    cli: &Cli,
    cwd: &Path,
    config: &WorkspaceConfig,
    workspace_file: Option<WorkspaceFile>,
) -> anyhow::Result<HostServices> {
    let scratch_path = cli
        .scratch
        .as_ref()
        .map(|p| absolute(cwd, p))
        .or_else(|| config.scratch_path())
        .ok_or_else(|| anyhow!("no scratch path configured and no home directory found"))?;
    let probe = Arc::new(FsFileProbe::new(config.registry().extensions(), &config.scan));
    let scratch = Arc::new(JsonScratchStore::new(scratch_path));

    Ok(match workspace_file {
        Some(file) => {
            let file = Arc::new(file);
            HostServices {
                folders: file.clone(),
                mutator: file,
                probe,
                scratch,
            }
        }
        None => {
            let folders = if cli.folders.is_empty() {
                vec![cwd.to_path_buf()]
            } else {
                cli.folders.iter().map(|f| absolute(cwd, f)).collect()
            };
            let folders = Arc::new(MemoryFolders::new(folders));
            HostServices {
                folders: folders.clone(),
                mutator: folders,
                probe,
                scratch,
            }
        }
    })
}

async fn run(
    cli: &Cli,
    cwd: &Path,
    ext: &Extension,
    workspace_file: Option<WorkspaceFile>,
) -> anyhow::Result<()> {
    match &cli.command {
        Cmd::Tree => print_tree(ext).await?,
        Cmd::Check => {
            let notices = ext.service.check_for_projects_not_added_to_workspace().await;
            for notice in &notices {
                match notice {
                    WorkspaceNotice::NotInWorkspace(entry) => {
                        println!("outside workspace: {}", entry.file_path.display())
                    }
                    WorkspaceNotice::Discovered { file_path, .. } => {
                        println!("untracked: {}", file_path.display())
                    }
                    WorkspaceNotice::FolderUnreadable(e) => println!("unreadable: {}", e),
                }
            }
            if notices.is_empty() {
                println!("workspace is consistent");
            }
        }
        Cmd::Open { path, project_type } => {
            let entry = ext
                .service
                .open_existing_or_new(&absolute(cwd, path), project_type.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Cmd::New { path, project_type } => {
            let entry = ext
                .service
                .add_temp_project(&absolute(cwd, path), project_type.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Cmd::Remove { path } => {
            let entry = ext.service.remove_project(&absolute(cwd, path)).await?;
            println!("removed {}", entry.file_path.display());
        }
        Cmd::Promote { path } => {
            let entry = ext.service.promote_project(&absolute(cwd, path)).await?;
            println!("promoted {}", entry.file_path.display());
        }
        Cmd::AddToWorkspace { paths } => {
            let paths: Vec<PathBuf> = paths.iter().map(|p| absolute(cwd, p)).collect();
            let added = ext.service.add_projects_to_workspace(&paths).await?;
            for entry in added {
                println!("added {}", entry.file_path.display());
            }
        }
        Cmd::Watch => {
            let file = workspace_file
                .ok_or_else(|| anyhow!("watch requires --workspace-file"))?;
            watch(ext, &file).await?;
        }
    }
    Ok(())
}

/// Track every untracked project file found in the open folders.
async fn adopt_discovered(ext: &Extension) {
    for notice in ext.service.check_for_projects_not_added_to_workspace().await {
        if let WorkspaceNotice::Discovered {
            file_path,
            project_type,
        } = notice
        {
            if let Err(e) = ext
                .service
                .open_existing_or_new(&file_path, project_type.as_deref())
                .await
            {
                warn!(path = %file_path.display(), error = %e, "Could not track discovered project");
            }
        }
    }
}

async fn watch(ext: &Extension, file: &WorkspaceFile) -> anyhow::Result<()> {
    let _watch = file.watch()?;
    let mut invalidated = ext.tree.subscribe();
    let mut events = ext.service.subscribe();
    print_tree(ext).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            ev = events.recv() => {
                if let Ok(WorkspaceEvent::Notice(WorkspaceNotice::Discovered { .. })) = ev {
                    adopt_discovered(ext).await;
                }
            }
            res = invalidated.recv() => {
                if res.is_ok() {
                    print_tree(ext).await?;
                }
            }
        }
    }
    Ok(())
}

async fn print_tree(ext: &Extension) -> anyhow::Result<()> {
    let roots = ext.tree.get_children(None).await;
    println!("{}", serde_json::to_string_pretty(&roots)?);
    Ok(())
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
