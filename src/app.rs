use chrono::{DateTime, Local, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::auth::{AuthContext, Session, SessionStore};
use crate::cache::{CacheResult, DeleteOutcome, SqliteStorage};
use crate::commands::{AccountsCommand, Command, TransactionsCommand};
use crate::config::Config;
use crate::finsupp::cache::AccountSyncCache;
use crate::finsupp::client::FinsuppClient;
use crate::finsupp::forms::{AccountDraft, TransactionDraft};
use crate::finsupp::types::{Account, Bank, Transaction};

/// HTTP status the API uses for accounts that still have transactions
const CONFLICT: u16 = 409;

/// Main application state
pub struct App {
  /// FinSupp API client, shares its auth context with the session
  client: FinsuppClient,

  /// Account listing with offline mirror
  accounts: AccountSyncCache,

  /// Persisted login session
  sessions: SessionStore,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let sessions = SessionStore::new(SessionStore::default_path()?);
    let cache_path = match &config.cache.path {
      Some(path) => path.clone(),
      None => SqliteStorage::default_path()?,
    };

    Self::with_parts(config, sessions, SqliteStorage::open(&cache_path)?)
  }

  fn with_parts(config: &Config, sessions: SessionStore, storage: SqliteStorage) -> Result<Self> {
    let auth = AuthContext::new();

    match sessions.load() {
      Ok(Some(session)) => auth.set_token(session.token),
      Ok(None) => {}
      Err(e) => warn!(error = %e, "Ignoring unreadable session"),
    }

    let client = FinsuppClient::new(&config.api, auth)?;
    let accounts = AccountSyncCache::new(client.clone(), storage);

    Ok(Self {
      client,
      accounts,
      sessions,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Login { email } => self.login(&email).await,
      Command::Register { name, email } => self.register(&name, &email).await,
      Command::Logout => self.logout(),
      Command::Accounts(cmd) => {
        self.ensure_logged_in()?;
        match cmd {
          AccountsCommand::List { search } => self.list_accounts(search.as_deref()).await,
          AccountsCommand::Create(fields) => self.create_account(fields.into()).await,
          AccountsCommand::Update { id, fields } => self.update_account(id, fields.into()).await,
          AccountsCommand::Delete { id } => self.delete_account(id).await,
        }
      }
      Command::Banks => {
        self.ensure_logged_in()?;
        self.list_banks().await
      }
      Command::Categories => {
        self.ensure_logged_in()?;
        self.list_categories().await
      }
      Command::Transactions(cmd) => {
        self.ensure_logged_in()?;
        match cmd {
          TransactionsCommand::List => self.list_transactions().await,
          TransactionsCommand::Create(fields) => self.create_transaction(fields.into()).await,
          TransactionsCommand::Delete { id } => self.delete_transaction(id).await,
        }
      }
    }
  }

  fn ensure_logged_in(&self) -> Result<()> {
    if self.client.auth().is_authenticated() {
      Ok(())
    } else {
      Err(eyre!("Not logged in. Run `finsupp login --email <email>` first."))
    }
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  async fn login(&self, email: &str) -> Result<()> {
    let password = Config::get_password()?;

    let user = self
      .client
      .login(email, &password)
      .await
      .map_err(|e| eyre!("Login failed: {}", e.advisory()))?;

    self.start_session(Session::new(user.name, user.token, email))
  }

  async fn register(&self, name: &str, email: &str) -> Result<()> {
    let password = Config::get_password()?;

    let user = self
      .client
      .register(name, email, &password)
      .await
      .map_err(|e| eyre!("Registration failed: {}", e.advisory()))?;

    self.start_session(Session::new(user.name, user.token, email))
  }

  /// Persist the session; a different user never sees the previous mirror.
  fn start_session(&self, session: Session) -> Result<()> {
    let previous_owner = self.sessions.load().ok().flatten().map(|s| s.owner);
    if previous_owner.as_deref() != Some(session.owner.as_str()) {
      self.accounts.clear()?;
    }

    self.sessions.save(&session)?;
    self.client.auth().set_token(session.token.as_str());

    info!("Session started");
    println!("Logged in as {}", session.name);
    Ok(())
  }

  fn logout(&self) -> Result<()> {
    self.sessions.remove()?;
    self.client.auth().clear();
    self.accounts.clear()?;

    info!("Session ended");
    println!("Logged out");
    Ok(())
  }

  // ==========================================================================
  // Accounts
  // ==========================================================================

  async fn list_accounts(&self, search: Option<&str>) -> Result<()> {
    let (accounts, banks) =
      futures::future::join(self.accounts.fetch_with_source(), self.client.list_banks()).await;
    let accounts = accounts?;

    let bank_names = match banks {
      Ok(banks) => bank_names(&banks),
      Err(e) => {
        warn!(error = %e, "Failed to load banks");
        HashMap::new()
      }
    };

    if let Some(notice) = offline_notice(&accounts) {
      eprintln!("{}", notice);
    }

    let visible: Vec<&Account> = accounts
      .data
      .iter()
      .filter(|a| a.matches(search.unwrap_or_default()))
      .collect();

    print!("{}", render_accounts(&visible, &bank_names));
    Ok(())
  }

  async fn find_account(&self, id: i64) -> Result<Account> {
    self
      .accounts
      .fetch()
      .await?
      .into_iter()
      .find(|a| a.id == id)
      .ok_or_else(|| eyre!("Account {} not found", id))
  }

  async fn create_account(&self, draft: AccountDraft) -> Result<()> {
    let request = draft.into_create_request()?;

    self
      .client
      .create_account(&request)
      .await
      .map_err(|e| eyre!("Could not create account: {}", e.advisory()))?;

    println!("Account created");
    Ok(())
  }

  async fn update_account(&self, id: i64, draft: AccountDraft) -> Result<()> {
    let current = self.find_account(id).await?;
    let request = draft.into_update_request(&current)?;

    self
      .client
      .update_account(id, &request)
      .await
      .map_err(|e| eyre!("Could not update account: {}", e.advisory()))?;

    println!("Account {} updated", id);
    Ok(())
  }

  async fn delete_account(&self, id: i64) -> Result<()> {
    match self.accounts.delete_outcome(id).await? {
      DeleteOutcome::Deleted => {
        println!("Account {} deleted", id);
        Ok(())
      }
      DeleteOutcome::Rejected { status, .. } if status == CONFLICT => Err(eyre!(
        "Cannot delete account {}: it still has transactions",
        id
      )),
      DeleteOutcome::Rejected { message, .. } => {
        Err(eyre!("Could not delete account {}: {}", id, message))
      }
      DeleteOutcome::Unavailable { reason } => Err(eyre!(
        "Could not reach the server, account {} was not deleted ({})",
        id,
        reason
      )),
    }
  }

  // ==========================================================================
  // Reference data
  // ==========================================================================

  async fn list_banks(&self) -> Result<()> {
    let banks = self
      .client
      .list_banks()
      .await
      .map_err(|e| eyre!("Could not load banks: {}", e.advisory()))?;

    for bank in banks {
      println!("{:>5}  {}", bank.id, bank.name);
    }
    Ok(())
  }

  async fn list_categories(&self) -> Result<()> {
    let categories = self
      .client
      .list_categories()
      .await
      .map_err(|e| eyre!("Could not load categories: {}", e.advisory()))?;

    for category in categories {
      println!("{:>5}  {}", category.id, category.description);
    }
    Ok(())
  }

  // ==========================================================================
  // Transactions
  // ==========================================================================

  async fn list_transactions(&self) -> Result<()> {
    let transactions = self
      .client
      .list_transactions()
      .await
      .map_err(|e| eyre!("Could not load transactions: {}", e.advisory()))?;

    // Names come from the mirror, no extra request
    let account_names: HashMap<i64, String> = self
      .accounts
      .mirrored()?
      .into_iter()
      .map(|a| (a.id, a.description))
      .collect();

    print!("{}", render_transactions(&transactions, &account_names));
    Ok(())
  }

  async fn create_transaction(&self, draft: TransactionDraft) -> Result<()> {
    let request = draft.into_request(Local::now().date_naive())?;

    let known = self.accounts.fetch().await?;
    for id in std::iter::once(request.account_id).chain(request.recipient_account_id) {
      if !known.iter().any(|a| a.id == id) {
        return Err(eyre!("Account {} not found", id));
      }
    }

    self
      .client
      .create_transaction(&request)
      .await
      .map_err(|e| eyre!("Could not create transaction: {}", e.advisory()))?;

    println!("Transaction created");
    Ok(())
  }

  async fn delete_transaction(&self, id: i64) -> Result<()> {
    self
      .client
      .delete_transaction(id)
      .await
      .map_err(|e| eyre!("Could not delete transaction {}: {}", id, e.advisory()))?;

    println!("Transaction {} removed", id);
    Ok(())
  }
}

fn bank_names(banks: &[Bank]) -> HashMap<i64, String> {
  banks.iter().map(|b| (b.id, b.name.clone())).collect()
}

/// Advisory shown when accounts come from the mirror.
fn offline_notice<T>(result: &CacheResult<T>) -> Option<String> {
  if !result.is_offline() {
    return None;
  }

  Some(match result.cached_at {
    Some(at) => format!("Offline: showing accounts saved {}", format_local(at)),
    None => "Offline: no saved accounts yet".to_string(),
  })
}

fn format_local(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn render_accounts(accounts: &[&Account], bank_names: &HashMap<i64, String>) -> String {
  if accounts.is_empty() {
    return "No accounts found\n".to_string();
  }

  let mut out = format!(
    "{:>5}  {:<24} {:<16} {:<10} {:>12}  {:>7}  {:>3}\n",
    "ID", "DESCRIPTION", "BANK", "TYPE", "BALANCE", "CLOSING", "DUE"
  );

  for account in accounts {
    let bank = bank_names
      .get(&account.bank)
      .cloned()
      .unwrap_or_else(|| format!("#{}", account.bank));

    out.push_str(&format!(
      "{:>5}  {:<24} {:<16} {:<10} {:>12.2}  {:>7}  {:>3}\n",
      account.id,
      account.description,
      bank,
      account.account_type,
      account.balance,
      account.closing_day,
      account.payment_due_day
    ));
  }

  out
}

fn render_transactions(transactions: &[Transaction], account_names: &HashMap<i64, String>) -> String {
  if transactions.is_empty() {
    return "No transactions found\n".to_string();
  }

  let name = |id: i64| {
    account_names
      .get(&id)
      .cloned()
      .unwrap_or_else(|| format!("#{}", id))
  };

  let mut out = String::new();
  for tx in transactions {
    let accounts = match tx.recipient_account_id {
      Some(to) => format!("{} -> {}", name(tx.account), name(to)),
      None => name(tx.account),
    };

    out.push_str(&format!(
      "{:>5}  {:<10}  {:<8}  {:>12.2}  {:<28}  {}\n",
      tx.id, tx.transaction_date, tx.transaction_type, tx.amount, accounts, tx.description
    ));
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::owner_fingerprint;
  use crate::config::ApiConfig;
  use crate::finsupp::types::{AccountType, TransactionType};
  use rust_decimal::Decimal;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn account(id: i64, description: &str, bank: i64) -> Account {
    Account {
      id,
      description: description.to_string(),
      bank,
      account_type: AccountType::Checking,
      closing_day: 1,
      payment_due_day: 10,
      balance: Decimal::new(1050, 1),
    }
  }

  fn app_in(dir: &tempfile::TempDir) -> App {
    // Nothing listens on the discard port
    app_with_url(dir, "http://127.0.0.1:9/")
  }

  fn app_with_url(dir: &tempfile::TempDir, url: &str) -> App {
    let config = Config {
      api: ApiConfig {
        url: url.to_string(),
        timeout_secs: 1,
      },
      ..Default::default()
    };
    let sessions = SessionStore::new(dir.path().join("session.json"));
    let storage = SqliteStorage::open(&dir.path().join("cache.db")).unwrap();
    App::with_parts(&config, sessions, storage).unwrap()
  }

  fn seed_mirror(dir: &tempfile::TempDir, accounts: &[Account]) {
    use crate::cache::MirrorStorage;
    let storage = SqliteStorage::open(&dir.path().join("cache.db")).unwrap();
    storage.replace_all(accounts).unwrap();
  }

  #[test]
  fn test_session_restores_token() {
    let dir = tempfile::tempdir().unwrap();
    SessionStore::new(dir.path().join("session.json"))
      .save(&Session::new("Ana".into(), "tok".into(), "ana@example.com"))
      .unwrap();

    let app = app_in(&dir);
    assert_eq!(app.client.auth().token().as_deref(), Some("tok"));
    assert!(app.ensure_logged_in().is_ok());
  }

  #[test]
  fn test_commands_require_login() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(&dir);
    assert!(app.ensure_logged_in().is_err());
  }

  #[test]
  fn test_logout_clears_everything() {
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    SessionStore::new(dir.path().join("session.json"))
      .save(&Session::new("Ana".into(), "tok".into(), "ana@example.com"))
      .unwrap();
    let app = app_in(&dir);

    app.logout().unwrap();

    assert!(!app.client.auth().is_authenticated());
    assert!(app.sessions.load().unwrap().is_none());
    assert!(app.accounts.mirrored().unwrap().is_empty());
  }

  #[test]
  fn test_same_user_keeps_mirror() {
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    SessionStore::new(dir.path().join("session.json"))
      .save(&Session::new("Ana".into(), "old".into(), "ana@example.com"))
      .unwrap();
    let app = app_in(&dir);

    app
      .start_session(Session::new("Ana".into(), "new".into(), "ANA@example.com"))
      .unwrap();

    assert_eq!(app.accounts.mirrored().unwrap().len(), 1);
    assert_eq!(app.client.auth().token().as_deref(), Some("new"));
  }

  #[test]
  fn test_other_user_clears_mirror() {
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    SessionStore::new(dir.path().join("session.json"))
      .save(&Session::new("Ana".into(), "old".into(), "ana@example.com"))
      .unwrap();
    let app = app_in(&dir);

    app
      .start_session(Session::new("Bia".into(), "new".into(), "bia@example.com"))
      .unwrap();

    assert!(app.accounts.mirrored().unwrap().is_empty());
    let saved = app.sessions.load().unwrap().unwrap();
    assert_eq!(saved.owner, owner_fingerprint("bia@example.com"));
  }

  #[tokio::test]
  async fn test_find_account_uses_mirror_when_offline() {
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1), account(2, "Card", 2)]);
    let app = app_in(&dir);

    assert_eq!(app.find_account(2).await.unwrap().description, "Card");
    assert!(app.find_account(3).await.is_err());
  }

  async fn mount_delete(server: &MockServer, id: i64, response: ResponseTemplate) {
    Mock::given(method("DELETE"))
      .and(path(format!("/accounts/{}", id)))
      .respond_with(response)
      .expect(1)
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn test_delete_account_with_transactions() {
    let server = MockServer::start().await;
    mount_delete(
      &server,
      1,
      ResponseTemplate::new(409).set_body_json(json!({"message": "Account has transactions"})),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    let app = app_with_url(&dir, &server.uri());

    let err = app.delete_account(1).await.unwrap_err();

    assert_eq!(err.to_string(), "Cannot delete account 1: it still has transactions");
    assert_eq!(app.accounts.mirrored().unwrap(), vec![account(1, "Wallet", 1)]);
  }

  #[tokio::test]
  async fn test_delete_account_rejected_shows_advisory() {
    let server = MockServer::start().await;
    mount_delete(
      &server,
      1,
      ResponseTemplate::new(500).set_body_json(json!({"message": "Internal error"})),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    let app = app_with_url(&dir, &server.uri());

    let err = app.delete_account(1).await.unwrap_err();

    assert_eq!(err.to_string(), "Could not delete account 1: Internal error");
    assert_eq!(app.accounts.mirrored().unwrap(), vec![account(1, "Wallet", 1)]);
  }

  #[tokio::test]
  async fn test_delete_account_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1)]);
    let app = app_in(&dir);

    let err = app.delete_account(1).await.unwrap_err();

    assert!(err
      .to_string()
      .starts_with("Could not reach the server, account 1 was not deleted"));
    assert_eq!(app.accounts.mirrored().unwrap(), vec![account(1, "Wallet", 1)]);
  }

  #[tokio::test]
  async fn test_delete_account_success() {
    let server = MockServer::start().await;
    mount_delete(&server, 1, ResponseTemplate::new(204)).await;
    let dir = tempfile::tempdir().unwrap();
    seed_mirror(&dir, &[account(1, "Wallet", 1), account(2, "Card", 2)]);
    let app = app_with_url(&dir, &server.uri());

    app.delete_account(1).await.unwrap();

    assert_eq!(app.accounts.mirrored().unwrap(), vec![account(2, "Card", 2)]);
  }

  #[test]
  fn test_offline_notice() {
    let online = CacheResult::from_network(Vec::<Account>::new());
    assert!(offline_notice(&online).is_none());

    let never_synced = CacheResult::offline(Vec::<Account>::new(), None);
    assert_eq!(
      offline_notice(&never_synced).as_deref(),
      Some("Offline: no saved accounts yet")
    );

    let synced = CacheResult::offline(Vec::<Account>::new(), Some(Utc::now()));
    assert!(offline_notice(&synced).unwrap().starts_with("Offline: showing accounts saved"));
  }

  #[test]
  fn test_render_accounts_resolves_bank_names() {
    let wallet = account(1, "Wallet", 1);
    let card = account(2, "Card", 9);
    let banks = bank_names(&[Bank {
      id: 1,
      name: "Nubank".to_string(),
    }]);

    let out = render_accounts(&[&wallet, &card], &banks);

    assert!(out.contains("Nubank"));
    assert!(out.contains("#9"));
    assert!(out.contains("105.00"));
    assert_eq!(out.lines().count(), 3);
    assert_eq!(render_accounts(&[], &banks), "No accounts found\n");
  }

  #[test]
  fn test_render_transfer_shows_both_accounts() {
    let names: HashMap<i64, String> = [(1, "Wallet".to_string()), (2, "Card".to_string())].into();
    let tx = Transaction {
      id: 5,
      description: "Move".to_string(),
      amount: Decimal::new(20, 0),
      transaction_type: TransactionType::Transfer,
      transaction_date: "2024-05-01".to_string(),
      account: 1,
      recipient_account_id: Some(2),
      category: None,
    };

    let out = render_transactions(&[tx], &names);
    assert!(out.contains("Wallet -> Card"));
    assert!(out.contains("TRANSFER"));
  }
}
