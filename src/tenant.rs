use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::seed;
use crate::store::{InMemoryStore, StoreError};

/// One hotel property: its store and the search engine that reads it.
pub struct Property {
    name: String,
    store: Arc<InMemoryStore>,
    engine: Engine,
    demo_loaded: OnceCell<()>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Load the demo fixture once, and only into a property with no data.
    async fn ensure_demo(&self) -> Result<(), StoreError> {
        self.demo_loaded
            .get_or_try_init(|| async {
                if self.store.snapshot().await.is_empty() {
                    seed::load(&self.store, self.engine.today()).await?;
                }
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }
}

/// Manages per-property stores. Each property gets its own store + WAL + compactor.
/// Property = database name from the pgwire connection.
pub struct TenantManager {
    properties: DashMap<String, Arc<Property>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    seed_demo: bool,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            properties: DashMap::new(),
            data_dir,
            compact_threshold,
            seed_demo: false,
        }
    }

    /// Load the demo fixture into every property that starts out empty.
    pub fn with_demo_seed(mut self, seed_demo: bool) -> Self {
        self.seed_demo = seed_demo;
        self
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Get or lazily open the property with the given name.
    pub async fn get_or_create(&self, name: &str) -> io::Result<Arc<Property>> {
        let property = match self.properties.get(name) {
            Some(p) => p.value().clone(),
            None => self.open(name)?,
        };
        if self.seed_demo {
            property
                .ensure_demo()
                .await
                .map_err(|e| io::Error::other(format!("demo seed failed: {e}")))?;
        }
        Ok(property)
    }

    fn open(&self, name: &str) -> io::Result<Arc<Property>> {
        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "property name too long",
            ));
        }
        if self.properties.len() >= MAX_TENANTS {
            return Err(io::Error::other("too many properties"));
        }

        // Sanitize the name to prevent path traversal
        let safe_name: String = name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty property name",
            ));
        }

        match self.properties.entry(name.to_string()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let store = Arc::new(InMemoryStore::open(&wal_path)?);
                tokio::spawn(compactor::run_compactor(store.clone(), self.compact_threshold));

                let property = Arc::new(Property {
                    name: safe_name,
                    store,
                    engine: Engine::new(),
                    demo_loaded: OnceCell::new(),
                });
                slot.insert(property.clone());
                metrics::gauge!(crate::observability::PROPERTIES_ACTIVE)
                    .set(self.properties.len() as f64);
                tracing::info!("opened property {} at {}", property.name, wal_path.display());
                Ok(property)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::Days;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("vacancy_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn standard() -> NewRoomType {
        NewRoomType {
            id: None,
            name: "Standard".into(),
            description: None,
            capacity: 2,
            price_per_night: 100.0,
        }
    }

    fn tomorrow_for_two(engine: &Engine) -> SearchRequest {
        let today = engine.today();
        SearchRequest {
            check_in: today.checked_add_days(Days::new(1)).unwrap(),
            check_out: today.checked_add_days(Days::new(3)).unwrap(),
            guest_count: 2,
        }
    }

    #[tokio::test]
    async fn property_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000);

        let a = tm.get_or_create("hotel_a").await.unwrap();
        let b = tm.get_or_create("hotel_b").await.unwrap();

        // Same ids in both properties
        for p in [&a, &b] {
            p.store().add_room_type(standard()).await.unwrap();
        }
        a.store()
            .add_room(NewRoom {
                id: None,
                room_number: "101".into(),
                room_type_id: 1,
                status: RoomStatus::Available,
                floor: None,
            })
            .await
            .unwrap();

        let req = tomorrow_for_two(a.engine());
        let in_a = a.engine().search_available(a.store(), &req).await.unwrap();
        let in_b = b.engine().search_available(b.store(), &req).await.unwrap();
        assert_eq!(in_a.len(), 1);
        assert!(in_b.is_empty()); // no rooms in b
    }

    #[tokio::test]
    async fn property_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _p = tm.get_or_create("my_hotel").await.unwrap();
        assert!(dir.join("my_hotel.wal").exists());
        assert_eq!(tm.len(), 1);
    }

    #[tokio::test]
    async fn same_property_returned() {
        let dir = test_data_dir("same");
        let tm = TenantManager::new(dir, 1000);

        let p1 = tm.get_or_create("foo").await.unwrap();
        let p2 = tm.get_or_create("foo").await.unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[tokio::test]
    async fn property_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000);

        let p = tm.get_or_create("../evil").await.unwrap();
        assert_eq!(p.name(), "evil");
        assert!(dir.join("evil.wal").exists());

        assert!(tm.get_or_create("../..").await.is_err());
    }

    #[tokio::test]
    async fn property_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).await.err().unwrap();
        assert!(err.to_string().contains("property name too long"));
    }

    #[tokio::test]
    async fn property_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir, 1000);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("p{i}")).await.unwrap();
        }
        let err = tm.get_or_create("one_more").await.err().unwrap();
        assert!(err.to_string().contains("too many properties"));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = test_data_dir("reopen");
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            let p = tm.get_or_create("hotel").await.unwrap();
            p.store().add_room_type(standard()).await.unwrap();
        }
        let tm = TenantManager::new(dir, 1000);
        let p = tm.get_or_create("hotel").await.unwrap();
        let snap = p.store().snapshot().await;
        assert_eq!(snap.room_types().count(), 1);
    }

    #[tokio::test]
    async fn demo_seed_fills_empty_property() {
        let dir = test_data_dir("demo_seed");
        let tm = TenantManager::new(dir, 1000).with_demo_seed(true);

        let p = tm.get_or_create("demo").await.unwrap();
        let snap = p.store().snapshot().await;
        assert_eq!(snap.room_types().count(), 5);
        assert_eq!(snap.rooms().count(), 13);
        assert_eq!(snap.reservations().len(), 10);

        // Second lookup does not load again
        let p = tm.get_or_create("demo").await.unwrap();
        assert_eq!(p.store().snapshot().await.rooms().count(), 13);
    }

    #[tokio::test]
    async fn demo_seed_skips_property_with_data() {
        let dir = test_data_dir("demo_skip");
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            let p = tm.get_or_create("real").await.unwrap();
            p.store().add_room_type(standard()).await.unwrap();
        }
        let tm = TenantManager::new(dir, 1000).with_demo_seed(true);
        let p = tm.get_or_create("real").await.unwrap();
        let snap = p.store().snapshot().await;
        assert_eq!(snap.room_types().count(), 1);
        assert!(snap.reservations().is_empty());
    }
}
