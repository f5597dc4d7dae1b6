use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use skills_index::{
    tools, AppConfig, BatchRequest, ChangeDetector, FileWatcher, Outcome, RefreshHandle,
    RefreshLoop, RefreshMode, SkillIndexer, SkillService,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Build the service and its first snapshot.
pub fn open(config: &AppConfig) -> SkillService {
    let service = SkillService::from_config(config);
    if let Err(e) = service.indexer().reload() {
        warn!("Initial index build failed: {}", e);
    }
    service
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<()> {
    match outcome {
        Ok(value) => print_json(&value),
        Err(e) => print_json(&e),
    }
}

pub fn list(service: &SkillService) -> Result<()> {
    print_json(&service.list_documents())
}

pub fn get(service: &SkillService, name: &str, sub: Option<&str>) -> Result<()> {
    match sub {
        Some(sub) => print_outcome(service.get_sub_unit(name, sub)),
        None => print_outcome(service.get_document(name)),
    }
}

pub fn batch(service: &SkillService, requests: &str) -> Result<()> {
    let requests: Vec<BatchRequest> =
        serde_json::from_str(requests).context("Batch requests must be a JSON array")?;
    print_json(&service.get_documents_batch(&requests))
}

pub fn search(service: &SkillService, query: &str, limit: Option<usize>) -> Result<()> {
    print_json(&service.search_metadata(query, limit))
}

pub fn search_content(service: &SkillService, query: &str, limit: Option<usize>) -> Result<()> {
    print_json(&service.search_content(query, limit))
}

pub fn reload(service: &SkillService) -> Result<()> {
    print_outcome(service.reload())
}

pub fn stats(service: &SkillService) -> Result<()> {
    print_json(&service.get_usage_stats())
}

pub fn validate(service: &SkillService) -> Result<()> {
    print_json(&service.validate_all())
}

pub fn list_tools() -> Result<()> {
    print_json(&tools::definitions())
}

pub fn call(service: &SkillService, tool: &str, args: Option<&str>) -> Result<()> {
    let args: Value = match args {
        Some(raw) => serde_json::from_str(raw).context("Tool arguments must be JSON")?,
        None => json!({}),
    };
    print_json(&tools::call(service, tool, &args))
}

/// Answer one `{"tool": ..., "args": {...}}` request line.
fn handle_request(service: &SkillService, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return json!({"error": format!("Invalid request: {}", e)}),
    };
    let Some(tool) = request.get("tool").and_then(Value::as_str) else {
        return json!({"error": "Missing 'tool' field"});
    };
    let args = request.get("args").cloned().unwrap_or_else(|| json!({}));
    tools::call(service, tool, &args)
}

/// Publish the first snapshot and return the change baseline taken just
/// before it. An unprimed detector is returned if either step fails, so the
/// first poll rebuilds.
fn initial_build(indexer: &SkillIndexer) -> ChangeDetector {
    // Baseline first: anything changed after this scan is caught by the
    // first poll.
    let baseline = ChangeDetector::primed(indexer.root());
    match (baseline, indexer.reload()) {
        (Ok(detector), Ok(_)) => detector,
        (_, Err(e)) => {
            warn!("Initial index build failed: {}", e);
            ChangeDetector::new()
        }
        (Err(e), Ok(_)) => {
            warn!("Initial scan failed: {}", e);
            ChangeDetector::new()
        }
    }
}

enum Refresher {
    Poll(RefreshHandle),
    Watch(FileWatcher),
}

/// Keep the index live and answer one JSON request per stdin line until
/// Ctrl-C.
pub async fn serve(config: &AppConfig) -> Result<()> {
    let service = Arc::new(SkillService::from_config(config));
    let indexer = Arc::clone(service.indexer());

    let detector = initial_build(&indexer);

    let refresher = match config.refresh.mode {
        RefreshMode::Poll => Refresher::Poll(
            RefreshLoop::new(indexer, config.refresh.interval())
                .with_detector(detector)
                .spawn(),
        ),
        RefreshMode::Watch => {
            let mut watcher = FileWatcher::new(indexer)?;
            watcher.watch()?;
            Refresher::Watch(watcher)
        }
    };

    info!(
        "Serving {} skills from {:?}, press Ctrl-C to stop",
        service.indexer().snapshot().len(),
        config.index.root
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let service = Arc::clone(&service);
                    let response =
                        tokio::task::spawn_blocking(move || handle_request(&service, &line))
                            .await
                            .unwrap_or_else(|e| json!({"error": format!("Request failed: {}", e)}));
                    println!("{}", response);
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    info!("Shutting down");
    match refresher {
        Refresher::Poll(handle) => handle.stop().await,
        Refresher::Watch(mut watcher) => watcher.unwatch()?,
    }
    Ok(())
}
