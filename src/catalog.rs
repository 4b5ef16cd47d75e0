// src/catalog.rs
use crate::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// Priced cosmetic item. Exclusive items are admin-gift-only and never
/// purchasable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub price: u64,
    pub exclusive: bool,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            price,
            exclusive: false,
        }
    }

    pub fn exclusive(id: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            price,
            exclusive: true,
        }
    }
}

/// Item catalog the purchase path consults. Ownership may live in a different
/// aggregate than the wallet, so `grant_ownership` can fail after the debit
/// committed; the service compensates the debit in that case.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn item(&self, item_id: &str) -> Result<CatalogItem, LedgerError>;
    async fn is_owned(&self, user: Uuid, item_id: &str) -> Result<bool, LedgerError>;
    async fn grant_ownership(&self, user: Uuid, item_id: &str) -> Result<(), LedgerError>;
}

/// In-memory catalog for tests and embedded use.
pub struct MemoryCatalog {
    items: Mutex<HashMap<String, CatalogItem>>,
    owned: Mutex<HashSet<(Uuid, String)>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            owned: Mutex::new(HashSet::new()),
        }
    }

    pub fn insert(&self, item: CatalogItem) {
        let mut items = self.items.lock().unwrap();
        items.insert(item.id.clone(), item);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn item(&self, item_id: &str) -> Result<CatalogItem, LedgerError> {
        let items = self.items.lock().unwrap();
        items
            .get(item_id)
            .cloned()
            .ok_or_else(|| LedgerError::ItemNotFound(item_id.to_string()))
    }

    async fn is_owned(&self, user: Uuid, item_id: &str) -> Result<bool, LedgerError> {
        let owned = self.owned.lock().unwrap();
        Ok(owned.contains(&(user, item_id.to_string())))
    }

    async fn grant_ownership(&self, user: Uuid, item_id: &str) -> Result<(), LedgerError> {
        let mut owned = self.owned.lock().unwrap();
        owned.insert((user, item_id.to_string()));
        Ok(())
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}
