mod api;
mod autosave;
mod cli;
mod config;
mod editor;
mod error;
mod guardrail;
mod models;
mod notify;
mod publish;
mod queue;
mod store;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{ApiClient, Backend};
use crate::autosave::SaveOutcome;
use crate::cli::{Cli, Commands, TweetAction};
use crate::config::{load_config, validate_config};
use crate::editor::Editor;
use crate::guardrail::{CheckState, FixOutcome, checklist};
use crate::models::{Platform, TWEET_CHAR_LIMIT, VersionMetadata};
use crate::notify::{Notice, NoticeLevel, Notifier};
use crate::publish::{PublishOrchestrator, ScheduleChoice};
use crate::queue::QueueView;
use crate::store::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.draftdesk.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(config_path = %cli.config.display(), "config loaded");

    validate_config(&config).context("config validation failed")?;
    info!("config validated successfully");

    if let Commands::Validate = cli.command {
        println!("Configuration is valid.");
        return Ok(());
    }

    let backend: Arc<dyn Backend> = Arc::new(ApiClient::from_config(&config.api).context("building API client")?);
    let (notifier, mut notices) = Notifier::channel();

    let result = run_command(cli.command, &config, backend, notifier).await;
    print_notices(&mut notices);
    result
}

async fn run_command(
    command: Commands,
    config: &config::Config,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
) -> Result<()> {
    match command {
        Commands::Validate => {}
        Commands::Show { session_id } => {
            let editor = Editor::open(backend, notifier, &session_id, config.quiet_period()).await?;
            {
                let store = editor.store().lock();
                if let Some(session) = store.current_session() {
                    let next = session
                        .status
                        .next()
                        .map(|n| format!(", next: {n:?}"))
                        .unwrap_or_default();
                    println!("{} [{:?}{next}] step {}", session.title, session.status, session.current_step);
                    println!("draft state: {}", save_state(&store));
                    for &platform in &session.platforms {
                        println!();
                        match store.version(platform) {
                            Some(version) => {
                                println!("== {platform} ({:?}) ==", version.status);
                                println!("{}", version.content);
                                for line in describe_metadata(&version.metadata) {
                                    println!("  {line}");
                                }
                            }
                            None => println!("== {platform} (no draft) =="),
                        }
                        for row in checklist(store.violations(platform)) {
                            let mark = match row.state {
                                CheckState::Passed => "ok".to_string(),
                                CheckState::Failed(severity) => format!("{severity:?}").to_lowercase(),
                            };
                            let fix = match (&row.violation_id, row.fixable) {
                                (Some(id), true) => format!("  (fixable: {id})"),
                                _ => String::new(),
                            };
                            println!("  [{mark}] {}{fix}", row.label);
                        }
                    }
                }
            }
            editor.close().await;
        }
        Commands::Edit { session_id, platform } => {
            let editor = open_draft(backend, notifier, &session_id, platform, config).await?;

            let (lines_tx, mut lines_rx) = mpsc::unbounded_channel::<String>();
            std::thread::spawn(move || {
                for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
                    if lines_tx.send(line).is_err() {
                        break;
                    }
                }
            });

            let mut content = String::new();
            while let Some(line) = lines_rx.recv().await {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&line);
                editor.edit(content.clone());
            }

            let dirty = editor.store().lock().unsaved_changes();
            if dirty && editor.save_now().await == SaveOutcome::Failed {
                editor.close().await;
                anyhow::bail!("final save failed; edits were not persisted");
            }
            editor.close().await;
        }
        Commands::Tweet { session_id, action } => {
            let editor = open_draft(backend, notifier, &session_id, Platform::Twitter, config).await?;
            let changed = match &action {
                TweetAction::Add { content } => editor.add_tweet(content),
                TweetAction::Delete { tweet_id } => editor.delete_tweet(tweet_id),
            };
            if !changed {
                editor.close().await;
                anyhow::bail!("thread unchanged (unknown tweet, or it is the only tweet left)");
            }
            save_and_close(editor).await?;
        }
        Commands::Scene {
            session_id,
            scene_id,
            duration,
        } => {
            let editor = open_draft(backend, notifier, &session_id, Platform::Reel, config).await?;
            if !editor.set_scene_duration(&scene_id, duration) {
                editor.close().await;
                anyhow::bail!("reel has no scene '{scene_id}'");
            }
            save_and_close(editor).await?;
        }
        Commands::Fix {
            session_id,
            platform,
            violation_ids,
        } => {
            let editor = Editor::open(backend, notifier, &session_id, config.quiet_period()).await?;
            let ids = if violation_ids.is_empty() {
                editor
                    .store()
                    .lock()
                    .violations(platform)
                    .iter()
                    .filter(|v| v.can_auto_fix)
                    .map(|v| v.id.clone())
                    .collect()
            } else {
                violation_ids
            };

            if ids.is_empty() {
                println!("No auto-fixable violations for {platform}.");
            } else {
                let max = config.guardrail.max_concurrent_fixes as usize;
                for (id, outcome) in editor.fixer().fix_all(ids, max).await {
                    let label = match outcome {
                        FixOutcome::Requested => "requested",
                        FixOutcome::AlreadyInFlight => "already running",
                        FixOutcome::Failed => "failed",
                    };
                    println!("{id}: {label}");
                }
                let remaining = editor
                    .fixer()
                    .refresh_violations(editor.store(), platform)
                    .await
                    .context("refreshing violations")?;
                println!("{remaining} violation(s) remaining on {platform}.");
            }
            editor.close().await;
        }
        Commands::Publish {
            session_id,
            platforms,
            date,
            time,
            wordpress_status,
        } => {
            let details = backend
                .get_session(&session_id)
                .await
                .with_context(|| format!("loading session '{session_id}'"))?;
            let integrations = backend.list_integrations().await.context("listing integrations")?;

            let mut flow = PublishOrchestrator::open(backend, notifier, &details.session, &integrations);
            for platform in platforms {
                flow.form.toggle(platform, true)?;
            }
            flow.form.wordpress_status = wordpress_status;
            if let (Some(date), Some(time)) = (date, time) {
                flow.form.schedule = ScheduleChoice::Later { date, time };
            }

            flow.submit().await?;
            if flow.is_open() {
                anyhow::bail!("publish request failed");
            }
            let targets: Vec<String> = flow.form.enabled().map(|p| p.to_string()).collect();
            println!("Submitted for {}.", targets.join(", "));
        }
        Commands::Queue { status, watch } => {
            let view = QueueView::new(backend, notifier);
            if watch {
                let cancel = CancellationToken::new();
                let ctrl_c_cancel = cancel.clone();
                tokio::spawn(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    ctrl_c_cancel.cancel();
                });
                queue::watch_loop(view, status, config.queue_poll_interval(), cancel, |item| {
                    println!("{}  {:<10} {:<9} {}", item.id, item.status, item.platform, item.error.as_deref().unwrap_or(""));
                })
                .await;
            } else {
                let items = view.list(status).await.context("fetching publish queue")?;
                if items.is_empty() {
                    println!("Queue is empty.");
                }
                for item in items {
                    let action = if item.can_retry() {
                        "(retryable)"
                    } else if item.can_cancel() {
                        "(cancellable)"
                    } else {
                        ""
                    };
                    println!(
                        "{}  {:<10} {:<9} {:<20} attempts={} {} {}",
                        item.id,
                        item.status,
                        item.platform,
                        item.scheduled_at.as_deref().unwrap_or("now"),
                        item.attempts,
                        action,
                        item.error.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Commands::Retry { item_id } => {
            if !QueueView::new(backend, notifier).retry(&item_id).await {
                anyhow::bail!("retry of '{item_id}' failed");
            }
        }
        Commands::Cancel { item_id } => {
            if !QueueView::new(backend, notifier).cancel(&item_id).await {
                anyhow::bail!("cancel of '{item_id}' failed");
            }
        }
        Commands::Integrations => {
            let integrations = backend.list_integrations().await.context("listing integrations")?;
            for integration in &integrations {
                println!("{:<10} {:<13} {}", integration.kind, format!("{:?}", integration.status).to_lowercase(), integration.name);
            }
            for platform in Platform::ALL {
                let key = publish::integration_key(platform);
                let ready = integrations
                    .iter()
                    .any(|i| i.kind == key && i.status == models::IntegrationStatus::Connected);
                println!("{platform}: {}", if ready { "can publish" } else { "not connected" });
            }
        }
    }
    Ok(())
}

/// Open an editor on one platform's draft, failing if the session has none.
async fn open_draft(
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    session_id: &str,
    platform: Platform,
    config: &config::Config,
) -> Result<Editor> {
    let editor = Editor::open(backend, notifier, session_id, config.quiet_period()).await?;
    editor.switch_platform(platform).await;
    if editor.store().lock().active_version().is_none() {
        editor.close().await;
        anyhow::bail!("session '{session_id}' has no {platform} draft");
    }
    Ok(editor)
}

/// Flush a metadata change right away, print the result and close.
async fn save_and_close(editor: Editor) -> Result<()> {
    let outcome = editor.save_now().await;
    let lines = editor
        .store()
        .lock()
        .active_version()
        .map(|v| describe_metadata(&v.metadata))
        .unwrap_or_default();
    editor.close().await;
    if outcome == SaveOutcome::Failed {
        anyhow::bail!("save failed; the change was not persisted");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn save_state(store: &SessionStore) -> &'static str {
    if store.is_saving() {
        "saving"
    } else if store.unsaved_changes() {
        "unsaved changes"
    } else {
        "saved"
    }
}

fn describe_metadata(metadata: &VersionMetadata) -> Vec<String> {
    match metadata {
        VersionMetadata::Article(m) => vec![
            format!("title: {}", m.meta_title),
            format!("focus keyword: {}", m.focus_keyword),
            format!("words: {}", m.word_count),
        ],
        VersionMetadata::Twitter(m) => {
            let over: Vec<u32> = m.over_limit().iter().map(|t| t.order).collect();
            let mut lines: Vec<String> = m
                .tweets
                .iter()
                .map(|t| format!("{}/{} [{}] {}", t.order, m.tweets.len(), t.id, t.content))
                .collect();
            if !over.is_empty() {
                lines.push(format!("over {TWEET_CHAR_LIMIT} characters: {over:?}"));
            }
            lines
        }
        VersionMetadata::LinkedIn(m) => vec![
            format!("characters: {}", m.character_count),
            format!("hashtags: {}", m.hashtags.join(" ")),
        ],
        VersionMetadata::Reel(m) => {
            let mut lines: Vec<String> = m
                .scenes
                .iter()
                .map(|s| format!("scene {} [{}] ({}s): {}", s.scene_number, s.id, s.duration, s.script))
                .collect();
            lines.push(format!("total: {}s", m.total_duration));
            lines
        }
    }
}

fn print_notices(notices: &mut mpsc::UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        match notice.level {
            NoticeLevel::Success => eprintln!("✓ {}", notice.message),
            NoticeLevel::Error => eprintln!("✗ {}", notice.message),
        }
    }
}
