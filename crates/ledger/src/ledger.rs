use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, ProductId, StockResult, StockroomError};
use stockroom_locations::LocationRegistry;

use crate::movement::{Journal, MovementKind, StockMovement};
use crate::record::InventoryRecord;

/// Composite ledger key. `BTreeMap` keeps keys in ascending order, which is
/// also the global lock-acquisition order for multi-key postings.
pub type RecordKey = (ProductId, LocationId);

/// One (product, location, qty) leg of a multi-key posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingLeg {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub qty: u64,
}

/// Aggregate stock totals across the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub on_hand: u64,
    pub reserved: u64,
    pub available: u64,
}

#[derive(Debug)]
struct Slot {
    record: InventoryRecord,
    /// Set under the map write lock when an empty record is dropped; any
    /// caller still holding the cell retries against the live map.
    evicted: bool,
}

enum OnMissing {
    Create,
    Fail(StockroomError),
}

/// The source of truth for stock numbers.
///
/// Every `(product, location)` record is an independently lockable unit;
/// multi-key postings lock records in ascending key order and validate every
/// leg before mutating anything, so no posting is ever observed half-applied.
/// Location occupancy moves inside the same critical section as the record it
/// tracks. Postings are not internally deduplicated; retry dedup is the
/// caller's concern.
#[derive(Debug)]
pub struct InventoryLedger {
    records: RwLock<BTreeMap<RecordKey, Arc<Mutex<Slot>>>>,
    registry: Arc<LocationRegistry>,
    journal: Mutex<Journal>,
}

impl InventoryLedger {
    pub fn new(registry: Arc<LocationRegistry>) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            registry: Arc::clone(&registry),
            journal: Mutex::new(Journal::default()),
        }
    }

    /// Post a receipt: raises on_hand, binds the product to the location and
    /// raises occupancy, all-or-nothing.
    pub fn receive(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<InventoryRecord> {
        require_positive(qty)?;
        let key = (product_id, location_id);
        let res = self.with_record(key, OnMissing::Create, |rec| {
            // Registry first: a full or foreign-bound location leaves the
            // record untouched.
            self.registry.place(location_id, product_id, qty)?;
            rec.receive(qty);
            rec.verify()?;
            self.journal(MovementKind::Receive, key, qty as i64, 0, None)?;
            Ok(rec.clone())
        });
        if res.is_err() {
            self.evict_if_empty(&key);
        }
        res
    }

    /// Reserve available stock against outbound demand.
    pub fn reserve(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<InventoryRecord> {
        require_positive(qty)?;
        let key = (product_id, location_id);
        self.with_record(
            key,
            OnMissing::Fail(StockroomError::InsufficientStock {
                product_id,
                location_id: Some(location_id),
                requested: qty,
                available: 0,
            }),
            |rec| {
                rec.reserve(qty)?;
                rec.verify()?;
                self.journal(MovementKind::Reserve, key, 0, qty as i64, None)?;
                Ok(rec.clone())
            },
        )
    }

    /// Return reserved stock to the available pool.
    pub fn release(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<InventoryRecord> {
        require_positive(qty)?;
        let key = (product_id, location_id);
        let res = self.with_record(
            key,
            OnMissing::Fail(StockroomError::OverRelease {
                requested: qty,
                reserved: 0,
            }),
            |rec| {
                rec.release(qty)?;
                rec.verify()?;
                self.journal(MovementKind::Release, key, 0, -(qty as i64), None)?;
                Ok(rec.clone())
            },
        );
        self.evict_if_empty(&key);
        res
    }

    /// Ship previously reserved stock: drops on_hand and reserved together
    /// and frees location occupancy.
    pub fn ship(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<InventoryRecord> {
        require_positive(qty)?;
        let key = (product_id, location_id);
        let res = self.with_record(
            key,
            OnMissing::Fail(StockroomError::InsufficientReservation {
                requested: qty,
                reserved: 0,
            }),
            |rec| {
                rec.check_ship(qty)?;
                self.withdraw_occupancy(location_id, qty)?;
                rec.ship(qty)?;
                rec.verify()?;
                self.journal(MovementKind::Ship, key, -(qty as i64), -(qty as i64), None)?;
                Ok(rec.clone())
            },
        );
        self.evict_if_empty(&key);
        res
    }

    /// Manual correction (cycle count finding, damage write-off). Occupancy
    /// follows the on-hand delta.
    pub fn adjust(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        delta: i64,
        reason: impl Into<String>,
    ) -> StockResult<InventoryRecord> {
        if delta == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let key = (product_id, location_id);
        let reason = reason.into();
        let res = self.with_record(key, OnMissing::Create, |rec| {
            if delta > 0 {
                self.registry.place(location_id, product_id, delta as u64)?;
                rec.apply_delta(delta)?;
            } else {
                rec.check_delta(delta)?;
                self.withdraw_occupancy(location_id, delta.unsigned_abs())?;
                rec.apply_delta(delta)?;
            }
            rec.verify()?;
            self.journal(MovementKind::Adjust, key, delta, 0, Some(reason))?;
            Ok(rec.clone())
        });
        self.evict_if_empty(&key);
        res
    }

    /// Cycle count: set on_hand to the absolute counted value and stamp the
    /// record.
    pub fn count(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        counted: u64,
        reason: impl Into<String>,
    ) -> StockResult<InventoryRecord> {
        let key = (product_id, location_id);
        let reason = reason.into();
        let res = self.with_record(key, OnMissing::Create, |rec| {
            let delta = counted as i64 - rec.on_hand as i64;
            if delta > 0 {
                self.registry.place(location_id, product_id, delta as u64)?;
            } else if delta < 0 {
                if counted < rec.reserved {
                    return Err(StockroomError::InsufficientStock {
                        product_id,
                        location_id: Some(location_id),
                        requested: counted,
                        available: rec.available(),
                    });
                }
                self.withdraw_occupancy(location_id, delta.unsigned_abs())?;
            }
            rec.set_counted(counted, Utc::now())?;
            rec.verify()?;
            self.journal(MovementKind::Count, key, delta, 0, Some(reason))?;
            Ok(rec.clone())
        });
        self.evict_if_empty(&key);
        res
    }

    /// Reserve several legs as one transactional set.
    ///
    /// Locks every touched record in ascending key order, validates all legs,
    /// then applies; a failed leg means nothing is applied.
    pub fn reserve_many(&self, legs: &[PostingLeg]) -> StockResult<()> {
        let wanted = merge_legs(legs)?;
        if wanted.is_empty() {
            return Ok(());
        }
        loop {
            let mut cells = Vec::with_capacity(wanted.len());
            for (key, qty) in &wanted {
                match self.lookup(key)? {
                    Some(cell) => cells.push((*key, *qty, cell)),
                    None => {
                        return Err(StockroomError::InsufficientStock {
                            product_id: key.0,
                            location_id: Some(key.1),
                            requested: *qty,
                            available: 0,
                        });
                    }
                }
            }
            let mut guards: Vec<MutexGuard<'_, Slot>> = Vec::with_capacity(cells.len());
            for (_, _, cell) in &cells {
                guards.push(lock_slot(cell)?);
            }
            if guards.iter().any(|g| g.evicted) {
                continue;
            }
            for (i, (_, qty, _)) in cells.iter().enumerate() {
                guards[i].record.check_reserve(*qty)?;
            }
            for (i, (key, qty, _)) in cells.iter().enumerate() {
                guards[i].record.reserve(*qty)?;
                guards[i].record.verify()?;
                self.journal(MovementKind::Reserve, *key, 0, *qty as i64, None)?;
            }
            return Ok(());
        }
    }

    /// Ship several legs as one transactional set (one order, many picks).
    pub fn ship_many(&self, legs: &[PostingLeg]) -> StockResult<()> {
        let wanted = merge_legs(legs)?;
        if wanted.is_empty() {
            return Ok(());
        }
        let keys: Vec<RecordKey> = wanted.keys().copied().collect();
        let res = loop {
            let mut cells = Vec::with_capacity(wanted.len());
            for (key, qty) in &wanted {
                match self.lookup(key)? {
                    Some(cell) => cells.push((*key, *qty, cell)),
                    None => {
                        return Err(StockroomError::InsufficientReservation {
                            requested: *qty,
                            reserved: 0,
                        });
                    }
                }
            }
            let mut guards: Vec<MutexGuard<'_, Slot>> = Vec::with_capacity(cells.len());
            for (_, _, cell) in &cells {
                guards.push(lock_slot(cell)?);
            }
            if guards.iter().any(|g| g.evicted) {
                continue;
            }
            for (i, (key, qty, _)) in cells.iter().enumerate() {
                guards[i].record.check_ship(*qty)?;
                let occupied = self.registry.snapshot(key.1)?.occupied;
                if occupied < *qty {
                    return Err(StockroomError::corruption(format!(
                        "location {} occupancy {} below ship quantity {}",
                        key.1, occupied, qty
                    )));
                }
            }
            for (i, (key, qty, _)) in cells.iter().enumerate() {
                self.withdraw_occupancy(key.1, *qty)?;
                guards[i].record.ship(*qty)?;
                guards[i].record.verify()?;
                self.journal(MovementKind::Ship, *key, -(*qty as i64), -(*qty as i64), None)?;
            }
            break Ok(());
        };
        for key in &keys {
            self.evict_if_empty(key);
        }
        res
    }

    /// Owned snapshot of one record, if it exists.
    pub fn snapshot(&self, product_id: ProductId, location_id: LocationId) -> Option<InventoryRecord> {
        let cell = self.lookup(&(product_id, location_id)).ok()??;
        let slot = cell.lock().ok()?;
        if slot.evicted {
            return None;
        }
        Some(slot.record.clone())
    }

    /// Records holding the given product, ascending by location id.
    pub fn records_for_product(&self, product_id: ProductId) -> Vec<InventoryRecord> {
        self.collect_records(|key| key.0 == product_id)
    }

    /// Every live record, ascending by (product, location).
    pub fn records(&self) -> Vec<InventoryRecord> {
        self.collect_records(|_| true)
    }

    /// Aggregate totals across all records.
    pub fn totals(&self) -> StockTotals {
        self.records()
            .iter()
            .fold(StockTotals::default(), |mut acc, rec| {
                acc.on_hand += rec.on_hand;
                acc.reserved += rec.reserved;
                acc.available += rec.available();
                acc
            })
    }

    /// Owned snapshot of the movement journal.
    pub fn movements(&self) -> Vec<StockMovement> {
        self.journal
            .lock()
            .map(|j| j.entries().to_vec())
            .unwrap_or_default()
    }

    pub fn movements_for_product(&self, product_id: ProductId) -> Vec<StockMovement> {
        self.movements()
            .into_iter()
            .filter(|m| m.product_id == product_id)
            .collect()
    }

    fn collect_records(&self, keep: impl Fn(&RecordKey) -> bool) -> Vec<InventoryRecord> {
        let cells: Vec<Arc<Mutex<Slot>>> = match self.records.read() {
            Ok(map) => map
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(_, cell)| Arc::clone(cell))
                .collect(),
            Err(_) => return Vec::new(),
        };
        cells
            .iter()
            .filter_map(|cell| {
                let slot = cell.lock().ok()?;
                if slot.evicted || slot.record.is_empty() {
                    None
                } else {
                    Some(slot.record.clone())
                }
            })
            .collect()
    }

    fn with_record<T>(
        &self,
        key: RecordKey,
        on_missing: OnMissing,
        f: impl FnOnce(&mut InventoryRecord) -> StockResult<T>,
    ) -> StockResult<T> {
        loop {
            let cell = match self.lookup(&key)? {
                Some(cell) => cell,
                None => match &on_missing {
                    OnMissing::Create => self.get_or_insert(key)?,
                    OnMissing::Fail(err) => return Err(err.clone()),
                },
            };
            let mut guard = lock_slot(&cell)?;
            if guard.evicted {
                continue;
            }
            return f(&mut guard.record);
        }
    }

    fn lookup(&self, key: &RecordKey) -> StockResult<Option<Arc<Mutex<Slot>>>> {
        let map = self
            .records
            .read()
            .map_err(|_| StockroomError::corruption("ledger map lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn get_or_insert(&self, key: RecordKey) -> StockResult<Arc<Mutex<Slot>>> {
        let mut map = self
            .records
            .write()
            .map_err(|_| StockroomError::corruption("ledger map lock poisoned"))?;
        Ok(Arc::clone(map.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(Slot {
                record: InventoryRecord::new(key.0, key.1),
                evicted: false,
            }))
        })))
    }

    /// Drop a record once on_hand and reserved both reach zero. Lock order is
    /// map-then-record, same as everywhere else.
    fn evict_if_empty(&self, key: &RecordKey) {
        let mut map = match self.records.write() {
            Ok(map) => map,
            Err(_) => return,
        };
        let empty = match map.get(key) {
            Some(cell) => match cell.lock() {
                Ok(mut slot) => {
                    if slot.record.is_empty() {
                        slot.evicted = true;
                        true
                    } else {
                        false
                    }
                }
                Err(_) => false,
            },
            None => false,
        };
        if empty {
            map.remove(key);
        }
    }

    /// Occupancy going negative here means the registry and the ledger fell
    /// out of step: report corruption, never correct silently.
    fn withdraw_occupancy(&self, location_id: LocationId, qty: u64) -> StockResult<()> {
        match self.registry.adjust_occupancy(location_id, -(qty as i64)) {
            Ok(_) => Ok(()),
            Err(StockroomError::NegativeOccupancy { location_id }) => {
                let err = StockroomError::corruption(format!(
                    "location {location_id} occupancy below ledger on_hand"
                ));
                tracing::error!(%location_id, "occupancy out of step with ledger");
                Err(err)
            }
            Err(e) => Err(e),
        }
    }

    fn journal(
        &self,
        kind: MovementKind,
        key: RecordKey,
        on_hand_delta: i64,
        reserved_delta: i64,
        reason: Option<String>,
    ) -> StockResult<u64> {
        let mut journal = self
            .journal
            .lock()
            .map_err(|_| StockroomError::corruption("journal lock poisoned"))?;
        Ok(journal.append(kind, key.0, key.1, on_hand_delta, reserved_delta, reason))
    }
}

fn require_positive(qty: u64) -> StockResult<()> {
    if qty == 0 {
        return Err(StockroomError::InvalidQuantity { value: 0 });
    }
    Ok(())
}

fn merge_legs(legs: &[PostingLeg]) -> StockResult<BTreeMap<RecordKey, u64>> {
    let mut wanted = BTreeMap::new();
    for leg in legs {
        require_positive(leg.qty)?;
        *wanted.entry((leg.product_id, leg.location_id)).or_insert(0) += leg.qty;
    }
    Ok(wanted)
}

fn lock_slot<'a>(cell: &'a Arc<Mutex<Slot>>) -> StockResult<MutexGuard<'a, Slot>> {
    cell.lock()
        .map_err(|_| StockroomError::corruption("inventory record lock poisoned"))
}
