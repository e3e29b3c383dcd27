mod config;
mod console;
mod demo;
mod host;

use std::sync::Arc;
use std::time::Duration;

use config::HostConfig;
use console::{ConsoleCommand, ConsoleReply};
use demo::{demo_stats, DemoOwner, DemoWorld};
use familiar_api::EntityWorld;
use familiar_core::{BehaviorCatalog, CompanionManager, CompanionSettings, LoadReport};
use familiar_lua::{LuaDocumentParser, ScriptDirectory};
use host::Host;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

const CONFIG_PATH: &str = "familiar.toml";

fn print_reply(reply: &ConsoleReply) {
    for message in &reply.messages {
        if reply.success {
            info!("{message}");
        } else {
            warn!("{message}");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = match HostConfig::load(CONFIG_PATH) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Familiar host v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Tick: {}ms, companion tick every {} host ticks",
        config.host.tick_millis, config.host.companion_interval
    );
    info!(
        "Scripts: {} (default behavior '{}', {} MB per VM, {} instructions per call)",
        config.scripts.directory,
        config.scripts.default_behavior,
        config.scripts.memory_mb,
        config.scripts.instruction_limit
    );

    let source = ScriptDirectory::new(&config.scripts.directory).write_default(config.scripts.write_default);
    let catalog = Arc::new(BehaviorCatalog::new(
        Box::new(source),
        Box::new(LuaDocumentParser::new(config.scripts.limits())),
        config.scripts.default_behavior.clone(),
    ));
    let report = catalog.load();
    if !report.is_clean() {
        warn!("Initial load was not clean; see the warnings above");
    }

    let world = Arc::new(DemoWorld::new(config.demo.spawn_config()));
    let world_dyn: Arc<dyn EntityWorld> = world.clone();
    let manager = CompanionManager::new(
        catalog,
        world_dyn,
        CompanionSettings {
            tick_interval: config.host.companion_interval.max(1),
            debug_to_owner: config.companions.debug_messages,
        },
    );
    let owner = Arc::new(DemoOwner::new(config.demo.owner.clone()));

    let (reload_tx, mut reload_rx) = tokio::sync::mpsc::channel::<LoadReport>(4);
    let mut host = Host::new(manager, world, owner, Arc::new(demo_stats), reload_tx);
    print_reply(&host.execute(ConsoleCommand::Summon(None)));

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    info!("Type 'help' for console commands");

    let mut tick_interval = tokio::time::interval(Duration::from_millis(config.host.tick_millis.max(1)));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                host.tick();
            }
            Some(line) = console_rx.recv() => {
                let reply = match ConsoleCommand::parse(&line) {
                    Ok(command) => host.execute(command),
                    Err(message) => ConsoleReply::err(message),
                };
                print_reply(&reply);
                if reply.should_stop {
                    break;
                }
            }
            Some(report) = reload_rx.recv() => {
                print_reply(&host.finish_reload(report));
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!(
        "Dismissing {} companion(s) after {} ticks...",
        host.manager().len(),
        host.current_tick()
    );
    host.shutdown();
    info!("Host shut down.");
}
