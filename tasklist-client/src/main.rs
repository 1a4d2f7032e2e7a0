//! Task-list command-line entry point.

use std::sync::Arc;

use tasklist_cache::CacheEventKind;
use tasklist_client::api_client::RestClient;
use tasklist_client::cli::{parse_command, Command, USAGE};
use tasklist_client::config::ClientConfig;
use tasklist_client::error::ClientError;
use tasklist_client::logging::init_logging;
use tasklist_client::state::App;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_logging(config.log_format)?;
    let command = parse_command(std::env::args().skip(1))?;

    let api = Arc::new(RestClient::from_config(&config)?);
    let mut app = App::new(config, api);
    let result = run(&mut app, command).await;
    app.shutdown();
    result
}

async fn run(app: &mut App, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Help => println!("{USAGE}"),
        Command::List => {
            let result = app.refresh_list().await;
            print_list(app);
            result?;
        }
        Command::Health => {
            let result = app.refresh_health().await;
            println!("{}", app.health.line());
            result?;
        }
        Command::Add { title } => {
            app.form.title = title;
            let result = app.submit_form().await;
            print_notifications(app);
            print_list(app);
            result?;
        }
        Command::Toggle { id } => {
            app.refresh_list().await?;
            let result = app.toggle(id).await;
            print_notifications(app);
            print_list(app);
            result?;
        }
        Command::SetCompleted { id, completed } => {
            let result = app.set_completed(id, completed).await;
            print_notifications(app);
            print_list(app);
            result?;
        }
        Command::Watch => watch(app).await?,
    }
    Ok(())
}

/// Print the health banner and the list whenever they change, until Ctrl-C.
///
/// Health is polled on `health_refresh_interval_ms`. The list is polled only
/// when `refresh_interval_ms` is set.
async fn watch(app: &mut App) -> Result<(), ClientError> {
    app.refresh_list().await.ok();
    app.refresh_health().await.ok();
    println!("{}", app.health.line());
    print_list(app);
    let mut list_events = app.subscribe_list()?;
    let mut health_events = app.subscribe_health()?;

    loop {
        tokio::select! {
            event = list_events.changed() => {
                let Some(event) = event else {
                    break;
                };
                match event.kind {
                    CacheEventKind::Updated | CacheEventKind::Lagged(_) => {
                        app.refresh_list().await.ok();
                        print_list(app);
                    }
                    CacheEventKind::FetchFailed(kind) => {
                        info!(?kind, "refresh failed, keeping the last list");
                    }
                    CacheEventKind::Invalidated => {}
                }
            }
            event = health_events.changed() => {
                let Some(event) = event else {
                    break;
                };
                match event.kind {
                    CacheEventKind::Updated | CacheEventKind::Lagged(_) => {
                        app.refresh_health().await.ok();
                        println!("{}", app.health.line());
                    }
                    CacheEventKind::FetchFailed(kind) => {
                        info!(?kind, "health check failed, keeping the last status");
                    }
                    CacheEventKind::Invalidated => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}

fn print_list(app: &App) {
    for line in app.list.lines() {
        println!("{line}");
    }
}

fn print_notifications(app: &mut App) {
    for notification in app.notifications.active() {
        match &notification.detail {
            Some(detail) => println!("[{}] {}: {}", notification.level.label(), notification.message, detail),
            None => println!("[{}] {}", notification.level.label(), notification.message),
        }
    }
    app.expire_notifications();
}
