//! In-memory stores for development and tests.
//!
//! All state sits behind one `tokio::sync::Mutex`, so every trait call is a
//! single lock scope.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use elizabeth_core::{ProductId, ProviderAccountId, SearchRequestId, SearchStatus, UserId};

use super::{NewProviderAccount, ProviderAccountStore, RepositoryError, SearchStore};
use crate::armtek::PartialContext;
use crate::models::{Product, ProductDraft, ProviderAccount, SearchRequest};

#[derive(Debug, Default)]
struct Inner {
    next_id: i32,
    requests: Vec<SearchRequest>,
    products: HashMap<ProductId, Product>,
    product_keys: HashMap<(String, String), ProductId>,
    links: HashMap<SearchRequestId, Vec<ProductId>>,
    accounts: Vec<ProviderAccount>,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    /// Ids of products linked to the user's requests.
    fn visible_products(
        &self,
        user_id: UserId,
        search_request_id: Option<SearchRequestId>,
    ) -> HashSet<ProductId> {
        self.requests
            .iter()
            .filter(|r| r.user_id == Some(user_id))
            .filter(|r| search_request_id.is_none_or(|id| r.id == id))
            .filter_map(|r| self.links.get(&r.id))
            .flatten()
            .copied()
            .collect()
    }
}

/// Process-local implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn create_request(
        &self,
        user_id: Option<UserId>,
        source: &str,
        query_string: &str,
    ) -> Result<SearchRequest, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let request = SearchRequest {
            id: SearchRequestId::new(inner.next_id()),
            user_id,
            source: source.to_string(),
            query_string: query_string.to_string(),
            status: SearchStatus::Pending,
            total_items: 0,
            created_at: now,
            updated_at: now,
        };
        inner.requests.push(request.clone());
        Ok(request)
    }

    async fn set_request_status(
        &self,
        id: SearchRequestId,
        status: SearchStatus,
        total_items: Option<i32>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        request.status = status;
        if let Some(total) = total_items {
            request.total_items = total;
        }
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn get_request(
        &self,
        id: SearchRequestId,
    ) -> Result<Option<SearchRequest>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_requests(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRequest>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .requests
            .iter()
            .rev()
            .filter(|r| r.user_id == Some(user_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn persist_products(
        &self,
        request_id: SearchRequestId,
        user_id: Option<UserId>,
        source: &str,
        drafts: &[ProductDraft],
        ttl: Duration,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut saved = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let key = (draft.artid().to_string(), source.to_string());
            let existing = inner
                .product_keys
                .get(&key)
                .and_then(|id| inner.products.get(id))
                .cloned();

            let product = match existing {
                Some(product) if product.is_fresh(now, ttl) => product,
                Some(product) => Product {
                    user_id,
                    search_request_id: Some(request_id),
                    item: draft.item.clone(),
                    alt_articles: draft.alt_articles.clone(),
                    api_token: draft.api_token.clone(),
                    characteristics_token: draft.characteristics_token.clone(),
                    fetched_at: now,
                    updated_at: now,
                    ..product
                },
                None => Product {
                    id: ProductId::new(inner.next_id()),
                    user_id,
                    search_request_id: Some(request_id),
                    source: source.to_string(),
                    item: draft.item.clone(),
                    alt_articles: draft.alt_articles.clone(),
                    api_token: draft.api_token.clone(),
                    characteristics_token: draft.characteristics_token.clone(),
                    fetched_at: now,
                    created_at: now,
                    updated_at: now,
                },
            };

            inner.product_keys.insert(key, product.id);
            inner.products.insert(product.id, product.clone());
            inner.links.entry(request_id).or_default().push(product.id);
            saved.push(product);
        }

        Ok(saved)
    }

    async fn products_for_request(
        &self,
        request_id: SearchRequestId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .links
            .get(&request_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.products.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_products(
        &self,
        user_id: UserId,
        search_request_id: Option<SearchRequestId>,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        let visible = inner.visible_products(user_id, search_request_id);
        let mut products: Vec<Product> = visible
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect();
        products.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_i32().cmp(&a.id.as_i32()))
        });
        products.truncate(limit);
        Ok(products)
    }

    async fn get_product(
        &self,
        user_id: UserId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let inner = self.inner.lock().await;
        if !inner.visible_products(user_id, None).contains(&id) {
            return Ok(None);
        }
        Ok(inner.products.get(&id).cloned())
    }
}

#[async_trait]
impl ProviderAccountStore for MemoryStore {
    async fn get_account(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ProviderAccount>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .iter()
            .find(|a| a.user_id == user_id && a.provider == provider)
            .cloned())
    }

    async fn save_account(
        &self,
        account: NewProviderAccount,
    ) -> Result<ProviderAccount, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        if let Some(existing) = inner
            .accounts
            .iter_mut()
            .find(|a| a.user_id == account.user_id && a.provider == account.provider)
        {
            existing.login = account.login;
            existing.encrypted_password = account.encrypted_password;
            existing.context = account.context;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let saved = ProviderAccount {
            id: ProviderAccountId::new(inner.next_id()),
            user_id: account.user_id,
            provider: account.provider,
            login: account.login,
            encrypted_password: account.encrypted_password,
            context: account.context,
            created_at: now,
            updated_at: now,
        };
        inner.accounts.push(saved.clone());
        Ok(saved)
    }

    async fn update_context(
        &self,
        id: ProviderAccountId,
        context: &PartialContext,
    ) -> Result<ProviderAccount, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.context = context.clone();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete_account(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let before = inner.accounts.len();
        inner
            .accounts
            .retain(|a| !(a.user_id == user_id && a.provider == provider));
        Ok(inner.accounts.len() != before)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::draft;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn request(store: &MemoryStore) -> SearchRequestId {
        store
            .create_request(Some(UserId::new(1)), "armtek", "OC90")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_request_lifecycle() {
        let store = MemoryStore::new();
        let id = request(&store).await;

        let created = store.get_request(id).await.unwrap().unwrap();
        assert_eq!(created.status, SearchStatus::Pending);

        store
            .set_request_status(id, SearchStatus::Done, Some(2))
            .await
            .unwrap();
        let done = store.get_request(id).await.unwrap().unwrap();
        assert_eq!(done.status, SearchStatus::Done);
        assert_eq!(done.total_items, 2);
    }

    #[tokio::test]
    async fn test_set_status_unknown_request() {
        let store = MemoryStore::new();
        let result = store
            .set_request_status(SearchRequestId::new(99), SearchStatus::Failed, None)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_requests_newest_first_per_user() {
        let store = MemoryStore::new();
        let first = request(&store).await;
        let second = request(&store).await;
        store
            .create_request(Some(UserId::new(2)), "armtek", "W712")
            .await
            .unwrap();

        let listed = store.list_requests(UserId::new(1), 10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);

        let limited = store.list_requests(UserId::new(1), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_product_keeps_values() {
        let store = MemoryStore::new();
        let first = request(&store).await;
        let second = request(&store).await;

        let original = store
            .persist_products(first, None, "armtek", &[draft("111", "Old name")], HOUR)
            .await
            .unwrap();
        let again = store
            .persist_products(second, None, "armtek", &[draft("111", "New name")], HOUR)
            .await
            .unwrap();

        assert_eq!(again[0].id, original[0].id);
        assert_eq!(again[0].item.name, "Old name");
        assert_eq!(again[0].fetched_at, original[0].fetched_at);

        let linked = store.products_for_request(second).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, original[0].id);
    }

    #[tokio::test]
    async fn test_stale_product_is_refreshed() {
        let store = MemoryStore::new();
        let first = request(&store).await;
        let second = request(&store).await;

        let original = store
            .persist_products(first, None, "armtek", &[draft("111", "Old name")], HOUR)
            .await
            .unwrap();
        let refreshed = store
            .persist_products(
                second,
                Some(UserId::new(1)),
                "armtek",
                &[draft("111", "New name")],
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(refreshed[0].id, original[0].id);
        assert_eq!(refreshed[0].item.name, "New name");
        assert_eq!(refreshed[0].search_request_id, Some(second));
        assert_eq!(refreshed[0].created_at, original[0].created_at);
        assert!(refreshed[0].fetched_at >= original[0].fetched_at);
    }

    #[tokio::test]
    async fn test_products_unique_per_source() {
        let store = MemoryStore::new();
        let id = request(&store).await;

        let armtek = store
            .persist_products(id, None, "armtek", &[draft("111", "A")], HOUR)
            .await
            .unwrap();
        let other = store
            .persist_products(id, None, "other", &[draft("111", "A")], HOUR)
            .await
            .unwrap();

        assert_ne!(armtek[0].id, other[0].id);
        assert_eq!(store.products_for_request(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_products_for_unknown_request_is_empty() {
        let store = MemoryStore::new();
        let products = store
            .products_for_request(SearchRequestId::new(7))
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_list_products_scoped_to_user_requests() {
        let store = MemoryStore::new();
        let first = request(&store).await;
        let second = request(&store).await;
        let foreign = store
            .create_request(Some(UserId::new(2)), "armtek", "W712")
            .await
            .unwrap()
            .id;

        let user = Some(UserId::new(1));
        let a = store
            .persist_products(first, user, "armtek", &[draft("111", "A")], HOUR)
            .await
            .unwrap();
        let b = store
            .persist_products(second, user, "armtek", &[draft("222", "B")], HOUR)
            .await
            .unwrap();
        let c = store
            .persist_products(foreign, Some(UserId::new(2)), "armtek", &[draft("333", "C")], HOUR)
            .await
            .unwrap();

        let listed = store.list_products(UserId::new(1), None, 10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b[0].id, a[0].id]);

        let only_first = store
            .list_products(UserId::new(1), Some(first), 10)
            .await
            .unwrap();
        assert_eq!(only_first.len(), 1);
        assert_eq!(only_first[0].id, a[0].id);

        let other_users_request = store
            .list_products(UserId::new(1), Some(foreign), 10)
            .await
            .unwrap();
        assert!(other_users_request.is_empty());

        assert_eq!(store.list_products(UserId::new(1), None, 1).await.unwrap().len(), 1);

        let own = store.get_product(UserId::new(1), a[0].id).await.unwrap();
        assert_eq!(own.unwrap().item.artid, "111");
        assert!(store.get_product(UserId::new(1), c[0].id).await.unwrap().is_none());
        assert!(
            store
                .get_product(UserId::new(1), ProductId::new(999))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_shared_product_visible_to_every_searcher() {
        let store = MemoryStore::new();
        let mine = request(&store).await;
        let theirs = store
            .create_request(Some(UserId::new(2)), "armtek", "OC90")
            .await
            .unwrap()
            .id;

        let original = store
            .persist_products(mine, Some(UserId::new(1)), "armtek", &[draft("111", "A")], HOUR)
            .await
            .unwrap();
        store
            .persist_products(theirs, Some(UserId::new(2)), "armtek", &[draft("111", "A")], HOUR)
            .await
            .unwrap();

        let found = store.get_product(UserId::new(2), original[0].id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_account_save_replaces() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let new = |login: &str| NewProviderAccount {
            user_id: user,
            provider: "armtek".to_string(),
            login: login.to_string(),
            encrypted_password: "enc".to_string(),
            context: PartialContext::default(),
        };

        let first = store.save_account(new("first")).await.unwrap();
        let second = store.save_account(new("second")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.login, "second");

        let context = PartialContext {
            vkorg: Some("4000".to_string()),
            ..PartialContext::default()
        };
        let updated = store.update_context(first.id, &context).await.unwrap();
        assert_eq!(updated.context.vkorg.as_deref(), Some("4000"));

        assert!(store.delete_account(user, "armtek").await.unwrap());
        assert!(!store.delete_account(user, "armtek").await.unwrap());
        assert!(store.get_account(user, "armtek").await.unwrap().is_none());
    }
}
