//! Transaction confirmation tracking.
//!
//! Polls the chain seam until a transaction reaches a target confirmation
//! depth. All calls block; callers that need concurrency run their own
//! threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::ChainBackend;
use crate::error::{Error, Result};
use crate::models::Txid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Depth at which a transaction is treated as settled.
pub const DEEP_CONFIRMATIONS: u64 = 6;

/// Consecutive not-found probes tolerated before giving up. A freshly
/// broadcast transaction can be briefly invisible to the API.
const MAX_NOT_FOUND_PROBES: u32 = 3;

/// Where a transaction stands relative to the chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Known to the network, not yet in a block.
    Pending,
    /// In a block, fewer than [`DEEP_CONFIRMATIONS`] deep.
    Confirmed,
    /// At least [`DEEP_CONFIRMATIONS`] deep.
    DeepConfirmed,
    /// Unknown to the chain backend.
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationStatus {
    pub txid: Txid,
    pub status: TxStatus,
    pub confirmations: u64,
    pub block_height: Option<u64>,
}

impl ConfirmationStatus {
    pub fn is_confirmed(&self) -> bool {
        self.confirmations >= 1
    }

    pub fn is_deep_confirmed(&self) -> bool {
        self.confirmations >= DEEP_CONFIRMATIONS
    }
}

/// Polls confirmation state through the chain seam.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    chain: Arc<dyn ChainBackend>,
    poll_interval: Duration,
}

impl ConfirmationTracker {
    pub fn new(chain: Arc<dyn ChainBackend>) -> Self {
        ConfirmationTracker {
            chain,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Current confirmation state, with the count computed against the
    /// chain tip.
    pub fn status(&self, txid: &Txid) -> Result<ConfirmationStatus> {
        let Some(tx_status) = self.chain.transaction_status(txid)? else {
            return Ok(ConfirmationStatus {
                txid: *txid,
                status: TxStatus::NotFound,
                confirmations: 0,
                block_height: None,
            });
        };

        if !tx_status.confirmed {
            return Ok(ConfirmationStatus {
                txid: *txid,
                status: TxStatus::Pending,
                confirmations: 0,
                block_height: None,
            });
        }

        let confirmations = match tx_status.block_height {
            Some(height) => self.chain.tip_height()?.saturating_sub(height) + 1,
            None => 1,
        };
        let status = if confirmations >= DEEP_CONFIRMATIONS {
            TxStatus::DeepConfirmed
        } else {
            TxStatus::Confirmed
        };

        Ok(ConfirmationStatus {
            txid: *txid,
            status,
            confirmations,
            block_height: tx_status.block_height,
        })
    }

    /// Block until `txid` reaches `target` confirmations, with the default
    /// timeout.
    pub fn wait_for_confirmation(&self, txid: &Txid, target: u64) -> Result<ConfirmationStatus> {
        self.wait_with_timeout(txid, target, DEFAULT_TIMEOUT)
    }

    /// Block until `txid` reaches `target` confirmations or `timeout`
    /// elapses.
    pub fn wait_with_timeout(
        &self,
        txid: &Txid,
        target: u64,
        timeout: Duration,
    ) -> Result<ConfirmationStatus> {
        let start = Instant::now();
        let mut not_found_probes = 0u32;

        loop {
            if start.elapsed() >= timeout {
                let confirmations = self.status(txid).map(|s| s.confirmations).unwrap_or(0);
                warn!(%txid, target, confirmations, "confirmation wait timed out");
                return Err(Error::ConfirmationTimeout {
                    txid: txid.to_hex(),
                    waited_secs: start.elapsed().as_secs(),
                    confirmations,
                });
            }

            let status = self.status(txid)?;

            if status.status == TxStatus::NotFound {
                not_found_probes += 1;
                if not_found_probes >= MAX_NOT_FOUND_PROBES {
                    return Err(Error::TransactionNotFound(txid.to_hex()));
                }
            } else {
                not_found_probes = 0;
            }

            if status.confirmations >= target {
                debug!(%txid, confirmations = status.confirmations, "target reached");
                return Ok(status);
            }

            thread::sleep(self.poll_interval);
        }
    }
}
