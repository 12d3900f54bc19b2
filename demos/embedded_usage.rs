//! Minimal embedding example for linkbio-core
//!
//! Runs the profile service against an in-memory document store and a
//! custom local store supplied by the application. Nothing here touches
//! the network or the filesystem.

use anyhow::Result;
use linkbio_core::config::SyncConfig;
use linkbio_core::model::{Category, DocumentPath, Item};
use linkbio_core::traits::LocalStore;
use linkbio_core::{LinkGroups, MemoryDocumentStore, ProfileSection, ProfileService};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Local store that prints every write
#[derive(Default)]
struct EmbeddedLocalStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait::async_trait]
impl LocalStore for EmbeddedLocalStore {
    async fn get_string(&self, key: &str) -> linkbio_core::Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .map_err(|_| linkbio_core::Error::local_store("poisoned"))?
            .get(key)
            .cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> linkbio_core::Result<()> {
        println!("[Embedded] {} = {}", key, value);
        self.values
            .lock()
            .map_err(|_| linkbio_core::Error::local_store("poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> linkbio_core::Result<()> {
        self.values
            .lock()
            .map_err(|_| linkbio_core::Error::local_store("poisoned"))?
            .remove(key);
        Ok(())
    }

    async fn flush(&self) -> linkbio_core::Result<()> {
        println!("[Embedded] Local state flushed");
        Ok(())
    }
}

fn social(platform: &str, position: i64) -> Item {
    Item::new(Category::social())
        .with_field("platform", platform)
        .with_field("position", position)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded linkbio-core Example ===\n");

    // Seed a profile the way an editor would have left it
    let store = MemoryDocumentStore::new();
    store
        .insert(
            &DocumentPath::new("teams/cafe"),
            serde_json::from_value(json!({"title": "Cafe", "version": 1}))?,
        )
        .await;

    println!("1. Creating service...");
    let (service, mut event_rx) = ProfileService::new(
        Arc::new(store.clone()),
        Arc::new(EmbeddedLocalStore::default()),
        &SyncConfig::default(),
    )?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. First fetch (no local marker yet)...");
    let profile = service.fetch_profile("cafe").await?;
    println!("   {:?}, title {:?}", profile.freshness, profile.title());

    println!("3. Pushing links...");
    let links = LinkGroups {
        social: vec![social("instagram", 0), social("tiktok", 1)],
        custom: vec![Item::new(Category::custom()).with_field("title", "Menu")],
    };
    let report = service.update_links("cafe", links).await?;
    println!(
        "   created {}, updated {}, deleted {}",
        report.created.len(),
        report.updated.len(),
        report.deleted.len()
    );

    println!("4. Dropping tiktok, re-pushing the rest...");
    let mut current = service.fetch_links("cafe").await?;
    current.social.retain(|item| item.fields.get("platform") != Some(&json!("tiktok")));
    let report = service.update_links("cafe", current).await?;
    println!(
        "   deleted {}, unchanged {}",
        report.deleted.len(),
        report.unchanged.len()
    );

    println!("5. Updating a section...");
    let outcome = service
        .update_section("cafe", ProfileSection::About(json!({"text": "Open daily"})))
        .await?;
    println!("   marker now {}", outcome.marker);

    let profile = service.fetch_profile("cafe").await?;
    println!("6. Second fetch: {:?}", profile.freshness);

    service.flush().await?;
    drop(service);
    event_listener.await?;

    println!("\n=== Embedding Successful ===");
    Ok(())
}
