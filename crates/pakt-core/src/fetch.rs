use futures::stream::{self, StreamExt, TryStreamExt};
use pakt_error::{PackageManagerError, Result};
use pakt_registry::IndexClient;
use pakt_resolver::{DependencyGraph, GraphPackage, PackageId};
use pakt_store::{StoreManager, TreeHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Store handles for every package of a graph, keyed by identity.
pub type FetchedPackages = HashMap<PackageId, TreeHandle>;

/// Acquires a store entry for every package in `graph`, at most `limit` at a time.
///
/// Tarballs are only downloaded for entries the store does not hold yet.
pub async fn fetch_packages<C: IndexClient>(
    store: &StoreManager,
    index: &C,
    graph: &DependencyGraph,
    limit: usize,
    cancel: &CancellationToken,
    debug: bool,
) -> Result<FetchedPackages> {
    let total = graph.packages.len();
    let done = AtomicUsize::new(0);
    let done = &done;

    stream::iter(graph.packages.values())
        .map(|node| async move {
            let handle = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(PackageManagerError::Cancelled),
                handle = acquire(store, index, node, debug) => handle,
            }?;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            pakt_logger::progress("Fetching packages", finished, total);
            Ok::<_, PackageManagerError>((node.package.id.clone(), handle))
        })
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}

async fn acquire<C: IndexClient>(
    store: &StoreManager,
    index: &C,
    node: &GraphPackage,
    debug: bool,
) -> Result<TreeHandle> {
    let package = &node.package;
    let label = package.id.to_string();
    store
        .acquire(&package.integrity, &label, || async {
            pakt_logger::debug(&format!("Downloading {label}"), debug);
            let version = package.id.version.to_string();
            let tarball = index
                .fetch_tarball(&package.id.name, &version, &package.tarball)
                .await?;
            Ok(tarball.bytes)
        })
        .await
}
