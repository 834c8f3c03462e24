use crate::core::error::StoreError;
use crate::models::user::{NewUser, User};
use crate::wal::wal::{Wal, WalOperation};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Journal-backed user store with unique indexes on email, identity token
/// and Telegram id.
///
/// Reads go straight to the maps. Writes are serialized by `write_lock` so
/// uniqueness checks and index updates happen as one step, and every write
/// is journaled before it becomes visible.
pub struct UserStore {
    users: DashMap<u32, Arc<User>>,
    by_email: DashMap<String, u32>,
    by_uuid: DashMap<String, u32>,
    by_telegram: DashMap<i64, u32>,
    next_id: AtomicU32,
    write_lock: Mutex<()>,
    wal: Arc<Wal>,
}

/// Emails are matched case-insensitively
fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserStore {
    pub fn new(wal: Arc<Wal>) -> Self {
        Self {
            users: DashMap::new(),
            by_email: DashMap::new(),
            by_uuid: DashMap::new(),
            by_telegram: DashMap::new(),
            next_id: AtomicU32::new(1),
            write_lock: Mutex::new(()),
            wal,
        }
    }

    fn journal(&self, op: WalOperation) -> Result<(), StoreError> {
        self.wal
            .log_operation(&op)
            .map_err(|e| StoreError::Journal(format!("{:#}", e)))
    }

    /// Create a user, assigning the next free id
    pub fn insert(&self, new: NewUser) -> Result<Arc<User>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.by_email.contains_key(&email_key(&new.email)) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                new.email
            )));
        }

        if self.by_uuid.contains_key(&new.uuid) {
            return Err(StoreError::Conflict(format!(
                "identity token {} is already in use",
                new.uuid
            )));
        }

        let id = self.next_id.load(Ordering::SeqCst);
        let user = User::from_new(id, new);

        self.journal(WalOperation::PutUser { user: user.clone() })?;
        self.next_id.store(id + 1, Ordering::SeqCst);

        Ok(self.index(user))
    }

    /// Apply `change` to a copy of the user and store the result.
    ///
    /// Fails with `Conflict` if the change would duplicate another user's
    /// email, identity token or Telegram id; nothing is written in that case.
    pub fn update<F>(&self, id: u32, change: F) -> Result<Arc<User>, StoreError>
    where
        F: FnOnce(&mut User),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        let mut updated = (*current).clone();
        change(&mut updated);
        updated.id = id;

        self.check_unique(&updated)?;
        self.journal(WalOperation::PutUser { user: updated.clone() })?;

        self.unindex(&current);
        Ok(self.index(updated))
    }

    /// Remove a user by id, returning the removed record
    pub fn remove(&self, id: u32) -> Result<Arc<User>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        self.journal(WalOperation::RemoveUser { id })?;
        self.unindex(&current);

        Ok(current)
    }

    fn check_unique(&self, user: &User) -> Result<(), StoreError> {
        let taken_by_other = |owner: Option<u32>| owner.is_some_and(|owner| owner != user.id);

        if taken_by_other(self.by_email.get(&email_key(&user.email)).map(|e| *e)) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }

        if taken_by_other(self.by_uuid.get(&user.uuid).map(|e| *e)) {
            return Err(StoreError::Conflict(format!(
                "identity token {} is already in use",
                user.uuid
            )));
        }

        if let Some(telegram_id) = user.telegram_id {
            if taken_by_other(self.by_telegram.get(&telegram_id).map(|e| *e)) {
                return Err(StoreError::Conflict(format!(
                    "telegram id {} is linked to another account",
                    telegram_id
                )));
            }
        }

        Ok(())
    }

    fn index(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.by_email.insert(email_key(&user.email), user.id);
        self.by_uuid.insert(user.uuid.clone(), user.id);
        if let Some(telegram_id) = user.telegram_id {
            self.by_telegram.insert(telegram_id, user.id);
        }
        self.users.insert(user.id, Arc::clone(&user));
        user
    }

    fn unindex(&self, user: &User) {
        self.users.remove(&user.id);
        self.by_email.remove(&email_key(&user.email));
        self.by_uuid.remove(&user.uuid);
        if let Some(telegram_id) = user.telegram_id {
            self.by_telegram.remove(&telegram_id);
        }
    }

    /// Load a journaled record without re-journaling it
    pub fn restore(&self, user: User) {
        if let Some(previous) = self.get(user.id) {
            self.unindex(&previous);
        }
        self.next_id.fetch_max(user.id + 1, Ordering::SeqCst);
        self.index(user);
    }

    /// Drop a journaled record without re-journaling the removal
    pub fn forget(&self, id: u32) {
        if let Some(previous) = self.get(id) {
            self.unindex(&previous);
        }
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    /// Never hand out an id below `next_id`
    pub fn reserve_ids(&self, next_id: u32) {
        self.next_id.fetch_max(next_id, Ordering::SeqCst);
    }

    pub fn next_id(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Hold off writers, e.g. while the journal is being compacted
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: u32) -> Option<Arc<User>> {
        self.users.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_by_email(&self, email: &str) -> Option<Arc<User>> {
        let id = self.by_email.get(&email_key(email)).map(|e| *e)?;
        self.get(id)
    }

    pub fn get_by_uuid(&self, uuid: &str) -> Option<Arc<User>> {
        let id = self.by_uuid.get(uuid).map(|e| *e)?;
        self.get(id)
    }

    pub fn get_by_telegram(&self, telegram_id: i64) -> Option<Arc<User>> {
        let id = self.by_telegram.get(&telegram_id).map(|e| *e)?;
        self.get(id)
    }

    /// All users ordered by id
    pub fn list(&self) -> Vec<Arc<User>> {
        let mut users: Vec<Arc<User>> = self
            .users
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        users.sort_by_key(|user| user.id);
        users
    }

    /// Users that belong in the daemon config, ordered by id
    pub fn active(&self) -> Vec<Arc<User>> {
        self.list().into_iter().filter(|user| !user.is_banned).collect()
    }

    /// The id high-water mark followed by one `PutUser` record per live
    /// user, for journal compaction
    pub fn snapshot(&self) -> Vec<WalOperation> {
        let mut operations = vec![WalOperation::NextUserId {
            next_id: self.next_id(),
        }];
        operations.extend(self.list().into_iter().map(|user| WalOperation::PutUser {
            user: (*user).clone(),
        }));
        operations
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    pub(crate) fn new_user(email: &str, uuid: &str) -> NewUser {
        let now = Utc::now();
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            uuid: uuid.to_string(),
            tariff_id: 1,
            created_at: now,
            tariff_expires_at: now,
        }
    }

    fn store() -> (TempDir, UserStore) {
        let dir = TempDir::new().unwrap();
        let wal = Wal::new(dir.path().join("users.journal")).unwrap();
        (dir, UserStore::new(Arc::new(wal)))
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let (_dir, store) = store();

        let a = store.insert(new_user("a@x.com", "uuid-a")).unwrap();
        let b = store.insert(new_user("b@x.com", "uuid-b")).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_uuid("uuid-b").unwrap().email, "b@x.com");
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let (_dir, store) = store();
        store.insert(new_user("a@x.com", "uuid-a")).unwrap();

        let err = store.insert(new_user("A@X.com", "uuid-other")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_uuid_is_conflict() {
        let (_dir, store) = store();
        store.insert(new_user("a@x.com", "uuid-a")).unwrap();

        let err = store.insert(new_user("b@x.com", "uuid-a")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_update_reindexes_telegram() {
        let (_dir, store) = store();
        let a = store.insert(new_user("a@x.com", "uuid-a")).unwrap();
        let b = store.insert(new_user("b@x.com", "uuid-b")).unwrap();

        store.update(a.id, |u| u.telegram_id = Some(42)).unwrap();
        assert_eq!(store.get_by_telegram(42).unwrap().id, a.id);

        let err = store.update(b.id, |u| u.telegram_id = Some(42)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get(b.id).unwrap().telegram_id, None);

        store.update(a.id, |u| u.telegram_id = Some(43)).unwrap();
        assert!(store.get_by_telegram(42).is_none());
    }

    #[test]
    fn test_remove_clears_indexes() {
        let (_dir, store) = store();
        let a = store.insert(new_user("a@x.com", "uuid-a")).unwrap();

        store.remove(a.id).unwrap();

        assert!(store.get(a.id).is_none());
        assert!(store.get_by_email("a@x.com").is_none());
        assert!(store.get_by_uuid("uuid-a").is_none());
        assert!(matches!(store.remove(a.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_active_skips_banned() {
        let (_dir, store) = store();
        let a = store.insert(new_user("a@x.com", "uuid-a")).unwrap();
        store.insert(new_user("b@x.com", "uuid-b")).unwrap();

        store.update(a.id, |u| u.is_banned = true).unwrap();

        let active: Vec<String> = store.active().iter().map(|u| u.uuid.clone()).collect();
        assert_eq!(active, vec!["uuid-b".to_string()]);
    }

    #[test]
    fn test_journal_replay_restores_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.journal");

        {
            let store = UserStore::new(Arc::new(Wal::new(path.clone()).unwrap()));
            let a = store.insert(new_user("a@x.com", "uuid-a")).unwrap();
            let b = store.insert(new_user("b@x.com", "uuid-b")).unwrap();
            store.update(a.id, |u| u.tariff_id = 2).unwrap();
            store.remove(b.id).unwrap();
        }

        let wal = Arc::new(Wal::new(path).unwrap());
        let store = UserStore::new(Arc::clone(&wal));
        for op in wal.replay().unwrap() {
            match op {
                WalOperation::PutUser { user } => store.restore(user),
                WalOperation::RemoveUser { id } => store.forget(id),
                WalOperation::NextUserId { next_id } => store.reserve_ids(next_id),
                WalOperation::PutPayment { .. } => {}
            }
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_email("a@x.com").unwrap().tariff_id, 2);

        // ids are never reused after a removal
        let c = store.insert(new_user("c@x.com", "uuid-c")).unwrap();
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_snapshot_keeps_id_high_water_mark() {
        let (_dir, original) = store();
        original.insert(new_user("a@x.com", "uuid-a")).unwrap();
        let b = original.insert(new_user("b@x.com", "uuid-b")).unwrap();
        original.remove(b.id).unwrap();

        let snapshot = original.snapshot();
        assert_eq!(snapshot[0], WalOperation::NextUserId { next_id: 3 });
        assert_eq!(snapshot.len(), 2);

        let (_other_dir, restored) = store();
        for op in snapshot {
            match op {
                WalOperation::PutUser { user } => restored.restore(user),
                WalOperation::NextUserId { next_id } => restored.reserve_ids(next_id),
                _ => {}
            }
        }

        let c = restored.insert(new_user("c@x.com", "uuid-c")).unwrap();
        assert_eq!(c.id, 3);
    }
}
