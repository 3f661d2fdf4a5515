use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, ProductId, StockResult, StockroomError};

/// Physical address of a storage location within the warehouse.
///
/// Unique per warehouse; rendered for operators as `A-01-02-03`
/// (zone-aisle-rack-bin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub zone: String,
    pub aisle: u32,
    pub rack: u32,
    pub bin: u32,
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02}-{:02}",
            self.zone, self.aisle, self.rack, self.bin
        )
    }
}

/// Registration request for a new location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpec {
    pub address: Address,
    pub capacity: u64,
}

/// A storage location and its occupancy state.
///
/// Leaf state: nothing here transitions beyond the occupancy count and the
/// product binding. Mutated only through Inventory Ledger postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub address: Address,
    pub capacity: u64,
    pub occupied: u64,
    /// A location holds a single product at a time; `None` means free for any.
    pub product: Option<ProductId>,
    pub created_at: DateTime<Utc>,
}

impl Location {
    pub fn free_capacity(&self) -> u64 {
        self.capacity - self.occupied
    }
}

/// Owns the set of storage locations and their capacity/occupancy invariants.
///
/// Each location is an independently lockable unit; the registry map itself is
/// only write-locked to register new locations.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    locations: HashMap<LocationId, Arc<Mutex<Location>>>,
    by_address: HashMap<Address, LocationId>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new location. Fails `DuplicateLocation` if the address tuple
    /// is already taken.
    pub fn register(&self, spec: LocationSpec) -> StockResult<Location> {
        if spec.capacity == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let mut inner = write_lock(&self.inner)?;
        if inner.by_address.contains_key(&spec.address) {
            return Err(StockroomError::DuplicateLocation(spec.address.to_string()));
        }
        let location = Location {
            id: LocationId::new(),
            address: spec.address.clone(),
            capacity: spec.capacity,
            occupied: 0,
            product: None,
            created_at: Utc::now(),
        };
        inner.by_address.insert(spec.address, location.id);
        inner
            .locations
            .insert(location.id, Arc::new(Mutex::new(location.clone())));
        Ok(location)
    }

    /// Move occupancy by `delta` units, atomically under the location's lock.
    ///
    /// Fails `CapacityExceeded` / `NegativeOccupancy` without applying. When
    /// occupancy returns to zero the product binding clears, freeing the bin
    /// for any product.
    pub fn adjust_occupancy(&self, location_id: LocationId, delta: i64) -> StockResult<u64> {
        let cell = self.cell(location_id)?;
        let mut loc = lock_location(&cell)?;
        let next = checked_occupancy(&loc, delta)?;
        loc.occupied = next;
        if loc.occupied == 0 {
            loc.product = None;
        }
        Ok(loc.occupied)
    }

    /// Bind `product_id` to the location. Fails unless the current binding is
    /// empty or already matches.
    pub fn bind_product(&self, location_id: LocationId, product_id: ProductId) -> StockResult<()> {
        let cell = self.cell(location_id)?;
        let mut loc = lock_location(&cell)?;
        match loc.product {
            Some(bound) if bound != product_id => {
                Err(StockroomError::LocationOccupiedByOtherProduct { location_id, bound })
            }
            _ => {
                loc.product = Some(product_id);
                Ok(())
            }
        }
    }

    /// Bind and occupy in one critical section: the ledger's receive path.
    ///
    /// Either both the binding and the occupancy increase apply, or neither.
    pub fn place(&self, location_id: LocationId, product_id: ProductId, qty: u64) -> StockResult<u64> {
        let cell = self.cell(location_id)?;
        let mut loc = lock_location(&cell)?;
        if let Some(bound) = loc.product {
            if bound != product_id {
                return Err(StockroomError::LocationOccupiedByOtherProduct { location_id, bound });
            }
        }
        let next = checked_occupancy(&loc, qty as i64)?;
        loc.product = Some(product_id);
        loc.occupied = next;
        Ok(loc.occupied)
    }

    /// Units the location can still absorb, as currently observed.
    pub fn free_capacity(&self, location_id: LocationId) -> StockResult<u64> {
        Ok(self.snapshot(location_id)?.free_capacity())
    }

    /// Owned snapshot of a location; never a live reference into the store.
    pub fn snapshot(&self, location_id: LocationId) -> StockResult<Location> {
        let cell = self.cell(location_id)?;
        let loc = lock_location(&cell)?;
        Ok(loc.clone())
    }

    /// Snapshots of every location, ordered by id.
    pub fn list(&self) -> Vec<Location> {
        let inner = match self.inner.read() {
            Ok(inner) => inner,
            Err(_) => return Vec::new(),
        };
        let mut out: Vec<Location> = inner
            .locations
            .values()
            .filter_map(|cell| cell.lock().ok().map(|loc| loc.clone()))
            .collect();
        out.sort_by_key(|loc| loc.id);
        out
    }

    fn cell(&self, location_id: LocationId) -> StockResult<Arc<Mutex<Location>>> {
        let inner = read_lock(&self.inner)?;
        inner
            .locations
            .get(&location_id)
            .cloned()
            .ok_or(StockroomError::UnknownLocation(location_id))
    }
}

fn checked_occupancy(loc: &Location, delta: i64) -> StockResult<u64> {
    let next = loc.occupied as i64 + delta;
    if next < 0 {
        return Err(StockroomError::NegativeOccupancy { location_id: loc.id });
    }
    let next = next as u64;
    if next > loc.capacity {
        return Err(StockroomError::CapacityExceeded {
            location_id: loc.id,
            capacity: loc.capacity,
            requested: next,
        });
    }
    Ok(next)
}

fn lock_location<'a>(cell: &'a Arc<Mutex<Location>>) -> StockResult<MutexGuard<'a, Location>> {
    cell.lock()
        .map_err(|_| StockroomError::corruption("location lock poisoned"))
}

fn read_lock<'a>(lock: &'a RwLock<Inner>) -> StockResult<std::sync::RwLockReadGuard<'a, Inner>> {
    lock.read()
        .map_err(|_| StockroomError::corruption("location registry lock poisoned"))
}

fn write_lock<'a>(lock: &'a RwLock<Inner>) -> StockResult<std::sync::RwLockWriteGuard<'a, Inner>> {
    lock.write()
        .map_err(|_| StockroomError::corruption("location registry lock poisoned"))
}
