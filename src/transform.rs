//! Blob transformer: applies the external formatter to each selected blob in
//! parallel, recording `old_blob_hash -> new_blob_hash` (spec §4.E).
//!
//! A formatter bug must not silently corrupt history: a non-zero exit or any
//! stderr output aborts the whole run (`FormatterError`), matching §4.E.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::FormatterConfig;
use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::model::ObjectKind;
use crate::object::store::{ObjectStore, TargetStore};
use crate::rewrite::ConcurrentMap;

/// Runs the formatter on one blob's content and returns its stdout.
async fn run_formatter(formatter: &FormatterConfig, input: &[u8]) -> Result<Vec<u8>, String> {
    let mut child = Command::new(&formatter.command)
        .args(&formatter.args)
        .current_dir(&formatter.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn {:?}: {e}", formatter.command))?;

    let mut stdin = child.stdin.take().expect("piped stdin");
    let input = input.to_vec();
    let write_task = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        drop(stdin);
    });

    let mut stdout = Vec::new();
    child
        .stdout
        .take()
        .expect("piped stdout")
        .read_to_end(&mut stdout)
        .await
        .map_err(|e| format!("reading formatter stdout: {e}"))?;

    let mut stderr = Vec::new();
    child
        .stderr
        .take()
        .expect("piped stderr")
        .read_to_end(&mut stderr)
        .await
        .map_err(|e| format!("reading formatter stderr: {e}"))?;

    let _ = write_task.await;
    let status = child
        .wait()
        .await
        .map_err(|e| format!("waiting for formatter: {e}"))?;

    if !status.success() {
        return Err(format!(
            "formatter exited with {status}: {}",
            String::from_utf8_lossy(&stderr)
        ));
    }
    if !stderr.is_empty() {
        return Err(format!(
            "formatter wrote to stderr: {}",
            String::from_utf8_lossy(&stderr)
        ));
    }
    Ok(stdout)
}

/// Applies the formatter to every blob in `selected`, writing translations
/// into `blob_map`. Concurrency budget: up to `worker_count` in flight at
/// once (spec §4.E / §5 recommends `3 × num_cpus`, I/O- and fork-bound).
pub async fn transform_blobs(
    source: Arc<dyn ObjectStore>,
    target: TargetStore,
    formatter: FormatterConfig,
    selected: HashSet<ObjectHash>,
    blob_map: Arc<ConcurrentMap>,
    worker_count: usize,
) -> Result<(), GraftError> {
    let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
    let formatter = Arc::new(formatter);
    let mut tasks: JoinSet<Result<(), GraftError>> = JoinSet::new();

    for blob_hash in selected {
        let source = source.clone();
        let target = target.clone();
        let formatter = formatter.clone();
        let blob_map = blob_map.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            let content = source.read_blob(blob_hash).await?;
            let formatted = run_formatter(&formatter, &content)
                .await
                .map_err(|detail| GraftError::Formatter {
                    hash: blob_hash,
                    detail,
                })?;
            let new_hash = target.write(ObjectKind::Blob, &formatted)?;
            blob_map.insert_or_check(blob_hash, new_hash)?;
            Ok(())
        });
    }

    while let Some(result) = tasks.join_next().await {
        result??;
    }

    Ok(())
}
