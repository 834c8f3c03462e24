use crate::core::error::StoreError;
use crate::models::payment::{Payment, PaymentStatus};
use crate::wal::wal::{Wal, WalOperation};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Journal-backed payment records. Payments are never deleted.
pub struct PaymentStore {
    payments: DashMap<u32, Arc<Payment>>,
    next_id: AtomicU32,
    write_lock: Mutex<()>,
    wal: Arc<Wal>,
}

impl PaymentStore {
    pub fn new(wal: Arc<Wal>) -> Self {
        Self {
            payments: DashMap::new(),
            next_id: AtomicU32::new(1),
            write_lock: Mutex::new(()),
            wal,
        }
    }

    fn journal(&self, payment: &Payment) -> Result<(), StoreError> {
        self.wal
            .log_operation(&WalOperation::PutPayment {
                payment: payment.clone(),
            })
            .map_err(|e| StoreError::Journal(format!("{:#}", e)))
    }

    /// Record a new pending payment
    pub fn create(
        &self,
        user_id: u32,
        amount: i64,
        tariff_id: u32,
        payment_method: &str,
    ) -> Result<Arc<Payment>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let id = self.next_id.load(Ordering::SeqCst);
        let payment = Payment {
            id,
            user_id,
            amount,
            tariff_id,
            payment_method: payment_method.to_string(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };

        self.journal(&payment)?;
        self.next_id.store(id + 1, Ordering::SeqCst);

        let payment = Arc::new(payment);
        self.payments.insert(id, Arc::clone(&payment));
        Ok(payment)
    }

    pub fn set_status(&self, id: u32, status: PaymentStatus) -> Result<Arc<Payment>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut payment = self
            .get(id)
            .map(|p| (*p).clone())
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
        payment.status = status;

        self.journal(&payment)?;

        let payment = Arc::new(payment);
        self.payments.insert(id, Arc::clone(&payment));
        Ok(payment)
    }

    /// Load a journaled record without re-journaling it
    pub fn restore(&self, payment: Payment) {
        self.next_id.fetch_max(payment.id + 1, Ordering::SeqCst);
        self.payments.insert(payment.id, Arc::new(payment));
    }

    /// Hold off writers, e.g. while the journal is being compacted
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: u32) -> Option<Arc<Payment>> {
        self.payments.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// A user's payments, oldest first
    pub fn list_for_user(&self, user_id: u32) -> Vec<Arc<Payment>> {
        let mut payments: Vec<Arc<Payment>> = self
            .payments
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        payments.sort_by_key(|payment| payment.id);
        payments
    }

    pub fn snapshot(&self) -> Vec<WalOperation> {
        let mut payments: Vec<Arc<Payment>> = self
            .payments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        payments.sort_by_key(|payment| payment.id);
        payments
            .into_iter()
            .map(|payment| WalOperation::PutPayment {
                payment: (*payment).clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}
