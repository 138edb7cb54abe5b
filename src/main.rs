//! sshtabs console
//!
//! Line-oriented driver for the tab registry over an in-memory host.
//! Two demo sessions (`srv1`, `srv2`) are seeded; `help` lists commands.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use sshtabs_lib::bridge::FileChangeEvent;
use sshtabs_lib::session::{CloseOutcome, SessionData, SessionTabRegistry, TabId, TabSurface};
use sshtabs_lib::sftp::{Completion, DisplayEntry, MutationRequest};
use sshtabs_lib::{init_logging, ConfigStorage, MemoryBridge, NoticeLevel, UserPrompt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

type Input = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// Asks confirmations on the same stdin the command loop reads.
struct ConsolePrompt {
    input: Input,
}

#[async_trait]
impl UserPrompt for ConsolePrompt {
    async fn confirm(&self, message: &str) -> bool {
        println!("{} [y/N]", message);
        let mut input = self.input.lock().await;
        match input.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim(), "y" | "Y" | "yes"),
            _ => false,
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", tag, message);
    }
}

fn seed_bridge() -> Arc<MemoryBridge> {
    let bridge = Arc::new(MemoryBridge::new());
    bridge.add_session("srv1");
    bridge.add_session("srv2");
    bridge.add_dir("/home/alice");
    bridge.add_dir("/home/bob");
    bridge.add_dir("/var/log");
    bridge.add_file("/etc/hosts", "127.0.0.1 localhost\n");
    bridge.add_file("/home/alice/notes.txt", "todo: rotate keys\n");
    bridge
}

fn session_for(id: &str) -> SessionData {
    SessionData::new(id, format!("{}.example.com", id))
        .with_config(serde_json::json!({ "host": format!("{}.example.com", id), "port": 22 }))
}

fn print_help() {
    println!("tabs | new | switch <n> | close <n> | connect <srv1|srv2> | disconnect");
    println!("cd <path> | ls | back | forward | complete <partial>");
    println!("touch <name> | mkdir <name> | rm <name> | mv <name> <new>");
    println!("edit <name> | save <text> | quit");
}

fn print_tabs(registry: &SessionTabRegistry) {
    let active = registry.active_id();
    for tab in registry.tabs() {
        let marker = if Some(tab.id) == active { "*" } else { " " };
        let state = if tab.is_connected { "connected" } else { "offline" };
        println!("{} {} {} ({})", marker, tab.id.0, tab.session_name, state);
    }
}

fn print_listing(surface: &TabSurface) {
    let snapshot = surface.navigator.snapshot();
    println!("{}", snapshot.current_path);
    for row in snapshot.display_entries() {
        match &row {
            DisplayEntry::Parent => println!("  up {}", row.name()),
            DisplayEntry::Entry(entry) => {
                println!("  {} {} ({} bytes)", entry.file_type.icon(), row.name(), entry.size)
            }
        }
    }
}

fn parse_tab(arg: Option<&str>) -> Option<TabId> {
    arg.and_then(|raw| raw.parse::<u64>().ok()).map(TabId)
}

/// Run one command. Returns `false` on `quit`.
async fn execute(
    line: &str,
    registry: &SessionTabRegistry,
    bridge: &MemoryBridge,
) -> Result<bool, Box<dyn Error>> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let surface = match registry.active_surface() {
        Some(surface) => surface,
        None => return Ok(true),
    };
    let navigator = &surface.navigator;

    match command {
        "" => {}
        "help" => print_help(),
        "quit" | "exit" => return Ok(false),
        "tabs" => print_tabs(registry),
        "new" => {
            let id = registry.create_tab(None).await;
            println!("opened tab {}", id.0);
        }
        "switch" => match parse_tab(rest) {
            Some(id) if registry.switch_tab(id) => print_tabs(registry),
            _ => println!("no such tab"),
        },
        "close" => match parse_tab(rest).map(|id| registry.close_tab(id)) {
            Some(CloseOutcome::Closed { .. }) => print_tabs(registry),
            Some(CloseOutcome::Rejected { warning }) => println!("{}", warning),
            Some(CloseOutcome::NotFound) | None => println!("no such tab"),
        },
        "connect" => {
            let id = registry
                .create_or_switch_to_session_tab(session_for(rest.unwrap_or("srv1")))
                .await;
            println!("tab {} ready", id.0);
            if let Some(surface) = registry.surface(id) {
                print_listing(&surface);
            }
        }
        "disconnect" => {
            if let Some(tab) = registry.active_tab() {
                registry.update_tab_connection(tab.id, false, None).await?;
                println!("tab {} offline", tab.id.0);
            }
        }
        "ls" => print_listing(&surface),
        "cd" => {
            if navigator.navigate_to_path(rest.unwrap_or("/")).await.is_ok() {
                print_listing(&surface);
            }
        }
        "back" | "forward" => {
            let selected = if command == "back" {
                navigator.history_back()
            } else {
                navigator.history_forward()
            };
            match selected {
                Some(path) => println!("path bar: {} (cd to go there)", path),
                None => println!("path bar: {}", navigator.input().text),
            }
        }
        "complete" => match navigator.complete_path(rest.unwrap_or_default()).await {
            Completion::Completed(path) => println!("{}", path),
            Completion::Candidates(names) => println!("{}", names.join("  ")),
            Completion::NoMatch => println!("no match"),
        },
        "touch" | "mkdir" => {
            let name = rest.unwrap_or_default().to_string();
            let request = if command == "touch" {
                MutationRequest::CreateFile { name }
            } else {
                MutationRequest::CreateDirectory { name }
            };
            if navigator.mutate(request).await.is_ok() {
                print_listing(&surface);
            }
        }
        "rm" => match navigator.entry(rest.unwrap_or_default()) {
            Some(entry) => {
                navigator.mutate(MutationRequest::Delete { entry }).await.ok();
                print_listing(&surface);
            }
            None => println!("no such entry"),
        },
        "mv" => {
            let mut args = rest.unwrap_or_default().split_whitespace();
            match (args.next().and_then(|name| navigator.entry(name)), args.next()) {
                (Some(entry), Some(new_name)) => {
                    let request = MutationRequest::Rename {
                        entry,
                        new_name: new_name.to_string(),
                    };
                    navigator.mutate(request).await.ok();
                    print_listing(&surface);
                }
                _ => println!("usage: mv <name> <new>"),
            }
        }
        "edit" => match navigator.entry(rest.unwrap_or_default()) {
            Some(entry) => {
                if let Ok(Some(watched)) = navigator.open_entry(&DisplayEntry::Entry(entry)).await {
                    println!("editing {} as {}", watched.remote_path, watched.local_path);
                }
            }
            None => println!("no such entry"),
        },
        "save" => match surface.sync.watched() {
            Some(watched) => {
                let text = rest.unwrap_or_default();
                bridge.write_local(&watched.local_path, format!("{}\n", text));
                registry
                    .dispatch_file_change(FileChangeEvent {
                        remote_path: watched.remote_path,
                        local_path: watched.local_path,
                    })
                    .await;
            }
            None => println!("nothing is open for editing"),
        },
        other => println!("unknown command: {} (try help)", other),
    }

    Ok(true)
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = ConfigStorage::new()?.load().await?;
    tracing::info!("sshtabs v{} starting", VERSION);

    let input: Input = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let prompt = Arc::new(ConsolePrompt {
        input: Arc::clone(&input),
    });
    let bridge = seed_bridge();
    let registry = Arc::new(SessionTabRegistry::new(bridge.clone(), prompt, settings));

    print_help();
    loop {
        let line = {
            let mut input = input.lock().await;
            input.next_line().await?
        };
        let line = match line {
            Some(line) => line,
            None => break,
        };
        if !execute(line.trim(), &registry, &bridge).await? {
            break;
        }
    }

    tracing::info!("sshtabs exiting with {} tab(s)", registry.tab_count());
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-V") {
        println!("sshtabs {}", VERSION);
        return;
    }

    init_logging();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
