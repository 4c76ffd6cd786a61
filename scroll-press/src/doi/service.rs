// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::bus::{ServiceMessage, ServiceSender};
use crate::context::Context;
use crate::doi::registrar::{DepositRequest, ReservedDeposit};
use crate::manager::{ServiceReadySender, Shutdown};
use crate::scrolls::{DoiStatus, ScrollId};
use crate::worker::{Factory, Task, TaskError, TaskResult};

const CHANNEL_CAPACITY: usize = 1024;

/// Mints DOIs for published scrolls in the background.
///
/// Publishing a scroll puts a `ScrollPublished` message on the bus which gets turned into a
/// mint task here. At startup all scrolls still carrying `doi_status = 'pending'` are re-queued
/// once: registration interrupted between registrar success and local persistence converges
/// instead of silently dropping a minted DOI.
pub async fn doi_service(
    context: Context,
    shutdown: Shutdown,
    tx: ServiceSender,
    tx_ready: ServiceReadySender,
) -> Result<()> {
    let pool_size = context.config.worker_pool_size as usize;

    let mut factory = Factory::<ScrollId, Context>::new(context.clone(), CHANNEL_CAPACITY);
    factory.register("mint", pool_size, mint_task);

    // Crash recovery: pick interrupted registrations back up (at-least-once)
    let pending = context.store.get_scrolls_with_pending_doi().await?;
    if !pending.is_empty() {
        info!("Re-queueing {} interrupted DOI registrations", pending.len());
        for id in pending {
            factory.queue(Task::new("mint", id));
        }
    }

    let on_error = factory.on_error();
    let mut rx = tx.subscribe();
    let mut shutdown = shutdown;

    if tx_ready.send(()).is_err() {
        warn!("No subscriber informed about DOI service being ready");
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = on_error.clone() => {
                return Err(anyhow!("Critical error in DOI worker pool"));
            }
            message = rx.recv() => match message {
                Ok(ServiceMessage::ScrollPublished(id)) => {
                    factory.queue(Task::new("mint", id));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    error!("DOI service lagging behind {} bus messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

/// Worker minting one DOI.
///
/// Idempotent: already minted scrolls are skipped and a previously reserved deposit is resumed
/// rather than opening a second one. The registrar is only called while no database work is in
/// flight, outcomes are written back in single short statements.
pub async fn mint_task(context: Context, input: ScrollId) -> TaskResult<ScrollId> {
    let store = &context.store;

    let registrar = match &context.registrar {
        Some(registrar) => registrar.clone(),
        None => {
            warn!("Registrar not configured, skipping DOI minting for {}", input);
            return Ok(None);
        }
    };

    let scroll = store
        .get_scroll(&input)
        .await
        .map_err(|err| TaskError::Critical(err.to_string()))?
        .ok_or_else(|| TaskError::Failure(format!("Scroll {} not found", input)))?;

    if scroll.doi_status == Some(DoiStatus::Minted) {
        info!("Scroll {} already has a minted DOI, skipping", input);
        return Ok(None);
    }

    if !scroll.is_published() {
        return Err(TaskError::Failure(format!(
            "Scroll {} is not published, not minting a DOI",
            input
        )));
    }

    let published_at = scroll.published_at.unwrap_or_else(Utc::now);

    store
        .set_doi_pending(&input)
        .await
        .map_err(|err| TaskError::Critical(err.to_string()))?;

    // Resume a reservation recorded by an earlier, interrupted attempt
    let reserved: Result<ReservedDeposit, _> = match (scroll.zenodo_deposit_id, &scroll.doi) {
        (Some(deposit_id), Some(_)) => registrar.resume_deposit(deposit_id).await,
        _ => {
            let request = DepositRequest::from_scroll(&scroll, published_at);
            registrar.create_deposit(&request).await
        }
    };

    let deposit = match reserved {
        Ok(deposit) => deposit,
        Err(err) => return fail_mint(&context, &input, err).await,
    };

    // Persist the reservation before publishing, a crash from here on can be reconciled
    if let Err(err) = store
        .set_doi_reserved(&input, &deposit.doi, deposit.deposit_id)
        .await
    {
        return Err(TaskError::Critical(err.to_string()));
    }

    let filename = format!(
        "{}.html",
        scroll.url_hash.as_deref().unwrap_or(scroll.id.as_str())
    );
    if let Err(err) = registrar
        .upload_file(&deposit, &filename, scroll.html_content.as_bytes())
        .await
    {
        return fail_mint(&context, &input, err).await;
    }

    let minted = match registrar.publish_deposit(deposit.deposit_id).await {
        Ok(minted) => minted,
        Err(err) => return fail_mint(&context, &input, err).await,
    };

    store
        .set_doi_minted(&input, &minted.doi, Utc::now())
        .await
        .map_err(|err| TaskError::Critical(err.to_string()))?;

    info!("Successfully minted DOI {} for scroll {}", minted.doi, input);

    Ok(None)
}

/// Records a failed registration. Terminal, the uploading user is never interrupted.
async fn fail_mint(
    context: &Context,
    id: &ScrollId,
    err: crate::doi::registrar::RegistrarError,
) -> TaskResult<ScrollId> {
    error!(
        "DOI minting failed for scroll {}: {} (retryable: {})",
        id, err, err.retryable
    );

    context
        .store
        .set_doi_failed(id)
        .await
        .map_err(|err| TaskError::Critical(err.to_string()))?;

    Err(TaskError::Failure(err.to_string()))
}
