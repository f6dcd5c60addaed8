pub mod blob;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::Order;
use crate::models::participant::{DriverAvailability, StoreProfile};
use crate::models::pricing::DeliveryPricing;
use crate::models::report::TransactionReport;
use crate::models::ticket::{NewTicketPosting, TicketTransaction};

#[derive(Debug, Default)]
pub struct Tables {
    pub orders: HashMap<Uuid, Order>,
    pub drivers: HashMap<Uuid, DriverAvailability>,
    pub stores: HashMap<Uuid, StoreProfile>,
    pub balances: HashMap<Uuid, i64>,
    pub ticket_log: Vec<TicketTransaction>,
    pub reports: Vec<TransactionReport>,
    pub pricing: Vec<DeliveryPricing>,
}

impl Tables {
    pub fn balance(&self, user_id: Uuid) -> i64 {
        self.balances.get(&user_id).copied().unwrap_or(0)
    }

    pub fn current_pricing(&self) -> Option<&DeliveryPricing> {
        self.pricing.last()
    }
}

enum Undo {
    Order(Uuid, Option<Order>),
    Driver(Uuid, Option<DriverAvailability>),
    Store(Uuid, Option<StoreProfile>),
    Balance(Uuid, Option<i64>),
    TicketLog(usize),
    Reports(usize),
    Pricing(usize),
}

/// A write unit over [`Tables`]. Reads see the unit's own writes; every write
/// is journaled so the unit can be rolled back as a whole.
pub struct Tx<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
}

impl<'a> Tx<'a> {
    /// Opens a unit over tables the backend holds exclusively until the
    /// unit commits or is rolled back.
    pub fn begin(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
        }
    }

    pub fn tables(&self) -> &Tables {
        &*self.tables
    }

    pub fn order(&self, id: Uuid) -> Result<&Order, AppError> {
        self.tables
            .orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub fn put_order(&mut self, order: Order) {
        let id = order.id;
        let previous = self.tables.orders.insert(id, order);
        self.undo.push(Undo::Order(id, previous));
    }

    pub fn put_driver(&mut self, availability: DriverAvailability) {
        let id = availability.driver_id;
        let previous = self.tables.drivers.insert(id, availability);
        self.undo.push(Undo::Driver(id, previous));
    }

    pub fn put_store(&mut self, store: StoreProfile) {
        let id = store.store_id;
        let previous = self.tables.stores.insert(id, store);
        self.undo.push(Undo::Store(id, previous));
    }

    pub fn push_report(&mut self, report: TransactionReport) {
        self.undo.push(Undo::Reports(self.tables.reports.len()));
        self.tables.reports.push(report);
    }

    pub fn push_pricing(&mut self, pricing: DeliveryPricing) {
        self.undo.push(Undo::Pricing(self.tables.pricing.len()));
        self.tables.pricing.push(pricing);
    }

    /// The only way a balance changes: the new balance and its ledger line are
    /// written together.
    pub fn post_ticket(&mut self, posting: NewTicketPosting) -> Result<TicketTransaction, AppError> {
        let current = self.tables.balance(posting.user_id);
        let balance_after = current.checked_add(posting.amount).ok_or_else(|| {
            AppError::Internal(format!(
                "ticket balance overflow for user {}",
                posting.user_id
            ))
        })?;

        let record = TicketTransaction {
            id: Uuid::new_v4(),
            user_id: posting.user_id,
            kind: posting.kind,
            amount: posting.amount,
            balance_after,
            order_id: posting.order_id,
            note: posting.note,
            created_at: Utc::now(),
        };

        let previous = self.tables.balances.insert(posting.user_id, balance_after);
        self.undo.push(Undo::Balance(posting.user_id, previous));
        self.undo.push(Undo::TicketLog(self.tables.ticket_log.len()));
        self.tables.ticket_log.push(record.clone());

        Ok(record)
    }

    /// Undoes every write made through this unit, newest first.
    pub fn rollback(self) {
        let Tx { tables, undo } = self;
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Order(id, prev) => restore(&mut tables.orders, id, prev),
                Undo::Driver(id, prev) => restore(&mut tables.drivers, id, prev),
                Undo::Store(id, prev) => restore(&mut tables.stores, id, prev),
                Undo::Balance(id, prev) => restore(&mut tables.balances, id, prev),
                Undo::TicketLog(len) => tables.ticket_log.truncate(len),
                Undo::Reports(len) => tables.reports.truncate(len),
                Undo::Pricing(len) => tables.pricing.truncate(len),
            }
        }
    }
}

fn restore<V>(map: &mut HashMap<Uuid, V>, id: Uuid, previous: Option<V>) {
    match previous {
        Some(value) => {
            map.insert(id, value);
        }
        None => {
            map.remove(&id);
        }
    }
}

pub type ReadFn<'a> = Box<dyn FnOnce(&Tables) + 'a>;
pub type TxFn<'a> = Box<dyn FnOnce(&mut Tx<'_>) -> Result<(), AppError> + 'a>;

/// The persistence contract the engine is written against: consistent reads
/// and serializable multi-statement units of work. A unit that returns `Err`
/// must leave no writes behind; conditions checked inside a unit must still
/// hold when its writes land.
pub trait Store: Send + Sync {
    fn read_with(&self, f: ReadFn<'_>) -> Result<(), AppError>;

    fn transaction_with(&self, f: TxFn<'_>) -> Result<(), AppError>;
}

impl dyn Store + '_ {
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, AppError> {
        let mut out = None;
        self.read_with(Box::new(|tables: &Tables| out = Some(f(tables))))?;
        out.ok_or_else(|| AppError::Internal("store read did not run".to_string()))
    }

    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut out = None;
        self.transaction_with(Box::new(|tx: &mut Tx<'_>| {
            out = Some(f(tx)?);
            Ok(())
        }))?;
        out.ok_or_else(|| AppError::Internal("store transaction did not run".to_string()))
    }
}

/// Single-process [`Store`]: one lock around all tables. Deployments running
/// several instances need a backend whose units are serializable across them.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn read_with(&self, f: ReadFn<'_>) -> Result<(), AppError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;
        f(&*guard);
        Ok(())
    }

    fn transaction_with(&self, f: TxFn<'_>) -> Result<(), AppError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;

        let mut tx = Tx::begin(&mut *guard);
        match f(&mut tx) {
            Ok(()) => Ok(()),
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }
}
