//! JSON Lines store.
//!
//! One file per record family, append-only:
//! - each line is a complete JSON object
//! - partial corruption loses individual lines, not the file
//! - files stay readable after an interrupted write
//!
//! Orders are append-only too: every state transition appends a full
//! order record, and the latest line per local id wins on load. A
//! `manifest.json` pins the schema version; a mismatch is fatal at open.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use helm_core::{ExecutionReport, LocalOrder, LocalOrderId};
use helm_portfolio::{CashFlowRecord, PortfolioSnapshot, TradeRecord};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Bumped whenever a persisted record shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const ORDERS_FILE: &str = "orders.jsonl";
const REPORTS_FILE: &str = "reports.jsonl";
const TRADES_FILE: &str = "trades.jsonl";
const CASH_FLOWS_FILE: &str = "cash_flows.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
}

/// In-memory indices rebuilt from disk at open.
#[derive(Debug, Default)]
struct Indices {
    /// Latest state per local order id.
    orders: HashMap<String, LocalOrder>,
    /// Remote id -> local id, for reconciliation lookups.
    remote_ids: HashMap<String, String>,
    /// Userref -> local ids, insertion order. One userref tags every
    /// order of a strategy.
    userrefs: HashMap<i64, Vec<String>>,
    trade_ids: HashSet<String>,
    flow_ids: HashSet<String>,
}

impl Indices {
    fn index_order(&mut self, order: &LocalOrder) {
        let local_key = order.local_id.as_str().to_string();
        if let Some(remote_id) = &order.remote_id {
            self.remote_ids.insert(remote_id.clone(), local_key.clone());
        }
        if let Some(userref) = order.userref {
            let ids = self.userrefs.entry(userref).or_default();
            if !ids.contains(&local_key) {
                ids.push(local_key.clone());
            }
        }
        self.orders.insert(local_key, order.clone());
    }
}

/// Directory-backed store. Cheap to open, safe to reopen after a crash.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    indices: Mutex<Indices>,
}

impl JsonlStore {
    /// Open (or initialize) a store directory.
    ///
    /// Creates the directory and manifest on first use. Refuses to open a
    /// directory written by a different schema version.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            let manifest: Manifest = serde_json::from_reader(File::open(&manifest_path)?)?;
            if manifest.schema_version != SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    found: manifest.schema_version,
                    expected: SCHEMA_VERSION,
                });
            }
        } else {
            let manifest = Manifest {
                schema_version: SCHEMA_VERSION,
            };
            let mut file = File::create(&manifest_path)?;
            serde_json::to_writer_pretty(&mut file, &manifest)?;
            file.write_all(b"\n")?;
            info!(dir = %dir.display(), "initialized store");
        }

        let store = Self {
            dir,
            indices: Mutex::new(Indices::default()),
        };
        store.load_indices()?;
        Ok(store)
    }

    fn load_indices(&self) -> StoreResult<()> {
        let mut indices = self.indices.lock();

        // Replay the order log; later lines supersede earlier ones.
        for order in self.read_lines::<LocalOrder>(ORDERS_FILE)? {
            indices.index_order(&order);
        }
        for trade in self.read_lines::<TradeRecord>(TRADES_FILE)? {
            indices.trade_ids.insert(trade.trade_id);
        }
        for flow in self.read_lines::<CashFlowRecord>(CASH_FLOWS_FILE)? {
            indices.flow_ids.insert(flow.entry_id);
        }

        debug!(
            orders = indices.orders.len(),
            trades = indices.trade_ids.len(),
            cash_flows = indices.flow_ids.len(),
            "store indices loaded"
        );
        Ok(())
    }

    fn append_line<T: Serialize>(&self, file: &str, value: &T) -> StoreResult<()> {
        // Append mode: never truncates existing data.
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        let mut writer = BufWriter::new(handle);
        serde_json::to_writer(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read every parseable line of a record file. Corrupt lines are
    /// skipped with a warning, never fatal.
    fn read_lines<T: DeserializeOwned>(&self, file: &str) -> StoreResult<Vec<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(file, line = lineno + 1, error = %e, "skipping corrupt line");
                }
            }
        }
        Ok(records)
    }

    /// Rewrite a record file atomically (temp file + rename).
    fn rewrite<T: Serialize>(&self, file: &str, records: &[T]) -> StoreResult<()> {
        let tmp = self.dir.join(format!("{file}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, self.dir.join(file))?;
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Store for JsonlStore {
    fn save_order(&self, order: &LocalOrder) -> StoreResult<()> {
        self.append_line(ORDERS_FILE, order)?;
        self.indices.lock().index_order(order);
        Ok(())
    }

    fn get_order(&self, local_id: &LocalOrderId) -> StoreResult<Option<LocalOrder>> {
        Ok(self.indices.lock().orders.get(local_id.as_str()).cloned())
    }

    fn get_order_by_remote_id(&self, remote_id: &str) -> StoreResult<Option<LocalOrder>> {
        let indices = self.indices.lock();
        Ok(indices
            .remote_ids
            .get(remote_id)
            .and_then(|local| indices.orders.get(local))
            .cloned())
    }

    fn get_orders_by_userref(&self, userref: i64) -> StoreResult<Vec<LocalOrder>> {
        let indices = self.indices.lock();
        let mut orders: Vec<LocalOrder> = indices
            .userrefs
            .get(&userref)
            .into_iter()
            .flatten()
            .filter_map(|local| indices.orders.get(local))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    fn get_open_orders(&self) -> StoreResult<Vec<LocalOrder>> {
        let indices = self.indices.lock();
        let mut open: Vec<LocalOrder> = indices
            .orders
            .values()
            .filter(|o| o.status.is_active())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }

    fn save_report(&self, report: &ExecutionReport) -> StoreResult<()> {
        self.append_line(REPORTS_FILE, report)
    }

    fn get_reports(&self, limit: usize) -> StoreResult<Vec<ExecutionReport>> {
        let mut reports = self.read_lines::<ExecutionReport>(REPORTS_FILE)?;
        if reports.len() > limit {
            reports.drain(..reports.len() - limit);
        }
        Ok(reports)
    }

    fn save_trade(&self, trade: &TradeRecord) -> StoreResult<()> {
        {
            let mut indices = self.indices.lock();
            if !indices.trade_ids.insert(trade.trade_id.clone()) {
                debug!(trade_id = %trade.trade_id, "duplicate trade, not persisted");
                return Ok(());
            }
        }
        self.append_line(TRADES_FILE, trade)
    }

    fn get_trades(&self) -> StoreResult<Vec<TradeRecord>> {
        self.read_lines(TRADES_FILE)
    }

    fn save_cash_flow(&self, flow: &CashFlowRecord) -> StoreResult<()> {
        {
            let mut indices = self.indices.lock();
            if !indices.flow_ids.insert(flow.entry_id.clone()) {
                debug!(entry_id = %flow.entry_id, "duplicate cash flow, not persisted");
                return Ok(());
            }
        }
        self.append_line(CASH_FLOWS_FILE, flow)
    }

    fn get_cash_flows(&self) -> StoreResult<Vec<CashFlowRecord>> {
        self.read_lines(CASH_FLOWS_FILE)
    }

    fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()> {
        self.append_line(SNAPSHOTS_FILE, snapshot)
    }

    fn get_snapshots(&self) -> StoreResult<Vec<PortfolioSnapshot>> {
        self.read_lines(SNAPSHOTS_FILE)
    }

    fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let snapshots = self.get_snapshots()?;
        let before = snapshots.len();
        let kept: Vec<PortfolioSnapshot> = snapshots
            .into_iter()
            .filter(|s| s.taken_at >= cutoff)
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite(SNAPSHOTS_FILE, &kept)?;
            debug!(removed, kept = kept.len(), "pruned snapshots");
        }
        Ok(removed)
    }
}
