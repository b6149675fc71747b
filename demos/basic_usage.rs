//! Basic usage of the synchronous cache storage from worker threads.

use cache_bridge::{
    backend::InMemoryStore, error::Result, CacheEntry, CacheStorage, HttpCacheEntry,
    StorageConfig,
};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Example entry: how often a page was rewritten
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RewriteStats {
    url: String,
    rewrites: u64,
}

impl CacheEntry for RewriteStats {}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("=== cache-bridge basic usage ===\n");

    // The runtime drives the store; the callers below stay synchronous.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| cache_bridge::Error::ConfigError(e.to_string()))?;

    let config = StorageConfig::from_env()?
        .with_operation_timeout(Some(Duration::from_millis(500)))
        .with_max_update_retries(20)
        .with_namespace("demo");
    let storage = CacheStorage::new(InMemoryStore::new(), config, runtime.handle().clone())?;

    // 1. put / get
    println!("1. Storing a page");
    let mut worker = storage.worker();
    let page = HttpCacheEntry::new(200, "OK", b"<html><body>hi</body></html>".to_vec())
        .with_header("Content-Type", "text/html")
        .with_header("Cache-Control", "max-age=300");
    worker.put("https://example.com/", &page)?;

    let cached: Option<HttpCacheEntry> = worker.get("https://example.com/")?;
    if let Some(entry) = &cached {
        println!(
            "   ✓ cached {} bytes, content type {:?}\n",
            entry.body.len(),
            entry.header("content-type")
        );
    }

    // 2. remove, then get answered from the worker's memo
    println!("2. Removing the page");
    worker.remove("https://example.com/")?;
    let gone: Option<HttpCacheEntry> = worker.get("https://example.com/")?;
    println!("   ✓ after remove: {:?}\n", gone.map(|e| e.status));

    // 3. concurrent optimistic updates from several threads
    println!("3. Counting rewrites from 4 threads");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = storage.clone();
            thread::spawn(move || -> Result<()> {
                let mut worker = storage.worker();
                for _ in 0..5 {
                    worker.update_entry("stats:/index.html", |old: Option<RewriteStats>| {
                        let mut stats = old.unwrap_or_else(|| RewriteStats {
                            url: "/index.html".to_string(),
                            rewrites: 0,
                        });
                        stats.rewrites += 1;
                        Ok(Some(stats))
                    })?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => println!("   ✗ worker thread panicked"),
        }
    }

    let stats: Option<RewriteStats> = worker.get("stats:/index.html")?;
    println!(
        "   ✓ {} rewrites recorded for {}\n",
        stats.as_ref().map(|s| s.rewrites).unwrap_or(0),
        stats.as_ref().map(|s| s.url.as_str()).unwrap_or("?")
    );

    println!("=== done ===");
    Ok(())
}
