//! Typeshift smoke harness.
//!
//! Wires the storage area, coordinator, two page agents, and a panel
//! together in one process and runs a scripted save → broadcast → render
//! flow, logging what each component does along the way.

use anyhow::Context;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use typeshift_agent::PageAgent;
use typeshift_coordinator::{Coordinator, Request};
use typeshift_core::presets::PresetKey;
use typeshift_core::settings::Scope;
use typeshift_core::{init_logging, LogConfig, TypeshiftResult};
use typeshift_css::generate_css;
use typeshift_panel::Panel;
use typeshift_store::{default_snapshot_path, SettingsStore, SyncStorage};
use url::Url;

#[tokio::main]
async fn main() -> TypeshiftResult<()> {
    init_logging(LogConfig::default().with_filter("info,typeshift_store=debug"));

    let store = SettingsStore::new(SyncStorage::new());
    let coordinator = Coordinator::new(store.clone());
    coordinator.install().await;

    // Two open tabs, each driven by its own page agent.
    let (tx_article, rx_article) = mpsc::unbounded_channel();
    let article_tab = coordinator
        .register_tab(Url::parse("https://example.com/article")?, tx_article.clone())
        .await;
    let article_agent = tokio::spawn(PageAgent::new("example.com", store.clone()).run(rx_article));

    let (tx_news, rx_news) = mpsc::unbounded_channel();
    let news_tab = coordinator
        .register_tab(Url::parse("https://news.example/today")?, tx_news)
        .await;
    let news_agent = tokio::spawn(PageAgent::new("news.example", store.clone()).run(rx_news));

    // The user opens the panel on the article tab, picks a preset, saves.
    let mut panel = Panel::new("example.com", store.clone());
    panel.connect_tab(tx_article.clone());
    panel.load().await?;
    panel.apply_preset(PresetKey::Professional);
    panel.save().await?;

    // The same save again, this time through the coordinator's message
    // endpoint, the way a remote surface would issue it.
    let response = coordinator
        .handle(Request::SaveSettings {
            domain: "news.example".to_string(),
            settings: panel.form().clone(),
            scope: Scope::Global,
            enabled: true,
        })
        .await;
    info!(success = response.success, "saved global settings via coordinator");

    // An unknown action gets the canonical failure.
    let response = coordinator.handle_value(json!({"action": "debugDump"})).await;
    info!(error = ?response.error, "unknown action rejected");

    // A freshly loaded tab gets a deferred re-apply.
    coordinator
        .set_tab_url(article_tab, Url::parse("https://example.com/other-article")?)
        .await;
    coordinator.on_tab_loaded(article_tab).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Show what the page is rendering with.
    if let Ok(Some(effective)) = store.resolve_effective("example.com").await {
        info!(family = %effective.font_family, "effective settings for example.com");
        println!("{}", generate_css(&effective));
    }

    let status = store.sync_status().await;
    info!(
        site_count = status.site_count,
        has_global = status.has_global_settings,
        "sync status"
    );

    let snapshot = default_snapshot_path();
    store.storage().persist_snapshot(&snapshot).await?;
    info!(path = %snapshot.display(), "snapshot persisted");

    // Close both tabs and let the agents tear down. The registry holds a
    // sender per tab, so the tabs must be unregistered as well before the
    // agents see their channels close.
    coordinator.unregister_tab(article_tab).await;
    coordinator.unregister_tab(news_tab).await;
    drop(tx_article);
    drop(panel);
    article_agent.await.context("article agent panicked")?;
    news_agent.await.context("news agent panicked")?;

    info!("smoke run complete");
    Ok(())
}
