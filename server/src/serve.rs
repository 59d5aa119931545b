//! Stdio worker
//!
//! Runs an [`EmbeddingWorker`] behind the JSON-lines transport so another
//! process can drive it with `embed`, `reduceCorpus` and `projectQuery`
//! commands. Responses are written in completion order.

use crate::error::{ServerError, ServerResult};
use crate::transport::{Inbound, RequestReader, ResponseWriter};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use vecscope_core::{EmbeddingWorker, EngineHandle, ReducerConfig, WorkerChannels, WorkerResponse};

/// Serve worker commands until the reader reaches EOF.
pub async fn serve<R, W>(
    mut reader: RequestReader<R>,
    writer: ResponseWriter<W>,
    engine: Arc<EngineHandle>,
    reducer: ReducerConfig,
) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (channels, worker) = EmbeddingWorker::spawn(engine, reducer);
    let WorkerChannels {
        requests,
        mut responses,
    } = channels;

    // Worker responses and transport-level errors share one output stream.
    let (out_tx, out_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            if forward_tx.send(response).is_err() {
                break;
            }
        }
    });
    let writer_task = tokio::spawn(write_responses(writer, out_rx));

    tracing::info!("Worker listening on stdio");

    while let Some(inbound) = reader.read_request().await? {
        match inbound {
            Inbound::Request(request) => {
                tracing::debug!("Received {} #{}", request.kind(), request.id());
                if requests.send(request).is_err() {
                    tracing::error!("Embedding worker stopped accepting requests");
                    break;
                }
            }
            Inbound::Malformed { id: Some(id), error } => {
                let _ = out_tx.send(WorkerResponse::failure(id, error));
            }
            Inbound::Malformed { id: None, error } => {
                tracing::warn!("Dropping request without id: {}", error);
            }
        }
    }

    tracing::info!("Input closed, shutting down worker");
    drop(requests);
    drop(out_tx);

    worker
        .await
        .map_err(|e| ServerError::Worker(e.to_string()))?;
    forwarder
        .await
        .map_err(|e| ServerError::Worker(e.to_string()))?;
    writer_task
        .await
        .map_err(|e| ServerError::Worker(e.to_string()))??;
    Ok(())
}

async fn write_responses<W: AsyncWrite + Unpin>(
    mut writer: ResponseWriter<W>,
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
) -> ServerResult<()> {
    while let Some(response) = responses.recv().await {
        writer.write_response(&response).await?;
    }
    Ok(())
}
