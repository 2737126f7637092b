//! Caching implementations for FinSupp types.

use crate::cache::{Cacheable, RemoteCollection, SqliteStorage, SyncCache};
use crate::error::RemoteError;

use super::client::FinsuppClient;
use super::types::Account;

/// Account listing backed by the local mirror.
pub type AccountSyncCache = SyncCache<FinsuppClient, SqliteStorage>;

impl Cacheable for Account {
  fn cache_id(&self) -> i64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "account"
  }
}

impl RemoteCollection for FinsuppClient {
  type Item = Account;

  async fn list(&self) -> Result<Option<Vec<Account>>, RemoteError> {
    self.list_accounts().await
  }

  async fn delete(&self, id: i64) -> Result<(), RemoteError> {
    self.delete_account(id).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::AuthContext;
  use crate::cache::DeleteOutcome;
  use crate::finsupp::client::tests::{account_json, client_for};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn mount_listing(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
      .and(path("/accounts/"))
      .respond_with(ResponseTemplate::new(status).set_body_json(body))
      .mount(server)
      .await;
  }

  fn ids(accounts: &[Account]) -> Vec<i64> {
    accounts.iter().map(|a| a.id).collect()
  }

  #[tokio::test]
  async fn test_server_error_falls_back_to_mirror() {
    let server = MockServer::start().await;
    let client = client_for(&server, AuthContext::with_token("t"));
    let cache = AccountSyncCache::new(client, SqliteStorage::open_in_memory().unwrap());

    mount_listing(
      &server,
      200,
      json!({"message": "ok", "dataList": [account_json(1, "Wallet"), account_json(2, "Card")]}),
    )
    .await;
    assert_eq!(ids(&cache.fetch().await.unwrap()), vec![1, 2]);

    server.reset().await;
    mount_listing(&server, 500, json!({"message": "boom"})).await;

    let result = cache.fetch_with_source().await.unwrap();
    assert!(result.is_offline());
    assert_eq!(ids(&result.data), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_unreachable_server_serves_mirror() {
    let config = crate::config::ApiConfig {
      // Nothing listens on the discard port
      url: "http://127.0.0.1:9/".to_string(),
      timeout_secs: 1,
    };
    let client = FinsuppClient::new(&config, AuthContext::new()).unwrap();
    let cache = AccountSyncCache::new(client, SqliteStorage::open_in_memory().unwrap());

    let result = cache.fetch_with_source().await.unwrap();

    assert!(result.is_offline());
    assert!(result.data.is_empty());
  }

  #[tokio::test]
  async fn test_delete_conflict_keeps_account() {
    let server = MockServer::start().await;
    mount_listing(
      &server,
      200,
      json!({"message": "ok", "dataList": [account_json(1, "Wallet")]}),
    )
    .await;
    Mock::given(method("DELETE"))
      .and(path("/accounts/1"))
      .respond_with(ResponseTemplate::new(409).set_body_json(json!({"message": "has transactions"})))
      .mount(&server)
      .await;

    let cache = AccountSyncCache::new(
      client_for(&server, AuthContext::new()),
      SqliteStorage::open_in_memory().unwrap(),
    );
    cache.fetch().await.unwrap();

    let outcome = cache.delete_outcome(1).await.unwrap();

    assert!(matches!(outcome, DeleteOutcome::Rejected { status: 409, .. }));
    assert_eq!(ids(&cache.mirrored().unwrap()), vec![1]);
  }

  #[tokio::test]
  async fn test_delete_success_updates_mirror() {
    let server = MockServer::start().await;
    mount_listing(
      &server,
      200,
      json!({"message": "ok", "dataList": [account_json(1, "Wallet"), account_json(2, "Card")]}),
    )
    .await;
    Mock::given(method("DELETE"))
      .and(path("/accounts/1"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let cache = AccountSyncCache::new(
      client_for(&server, AuthContext::new()),
      SqliteStorage::open_in_memory().unwrap(),
    );
    cache.fetch().await.unwrap();

    assert!(cache.delete(1).await.unwrap());
    assert_eq!(ids(&cache.mirrored().unwrap()), vec![2]);
  }
}
