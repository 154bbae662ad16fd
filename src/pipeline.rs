// Record Pipeline
// Every record is logged to CSV first, then relayed to the companion

use crate::record::Record;
use crate::storage::SessionLog;
use crate::transport::TransportSender;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fans a record out to the session log and the transport
pub struct RecordPipeline {
    log: Option<SessionLog>,
    sender: Arc<TransportSender>,
}

impl RecordPipeline {
    pub fn new(log: Option<SessionLog>, sender: Arc<TransportSender>) -> Self {
        Self { log, sender }
    }

    pub fn session_log(&self) -> Option<&SessionLog> {
        self.log.as_ref()
    }

    pub fn sender(&self) -> &Arc<TransportSender> {
        &self.sender
    }

    /// Log and send one record; true iff some channel accepted it.
    ///
    /// The CSV row is written whether or not delivery succeeds.
    pub async fn ingest(&self, record: Record) -> bool {
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&record) {
                warn!(error = %e, mac = record.mac(), "CSV append failed");
            }
        }
        self.sender.send(&record).await
    }

    /// Ingest records until every producer has dropped its sender
    pub async fn run(self, mut records: mpsc::Receiver<Record>) {
        let mut delivered = 0u64;
        let mut total = 0u64;
        while let Some(record) = records.recv().await {
            total += 1;
            if self.ingest(record).await {
                delivered += 1;
            }
        }
        debug!(total, delivered, "record pipeline drained");
    }
}
