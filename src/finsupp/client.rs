use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::auth::AuthContext;
use crate::config::ApiConfig;
use crate::error::RemoteError;
use crate::finsupp::api_types::{
  error_advisory, AccountRequest, ApiListResponse, CreateTransactionRequest, LoginRequest,
  LoginResponse, RegisterRequest, UserData,
};
use crate::finsupp::types::{Account, Bank, Category, Transaction};

/// Page requested from paginated listings
const PAGE: &str = "0";
const PAGE_SIZE: &str = "50";

/// FinSupp API client wrapper
///
/// Every request carries the bearer token held by the injected [`AuthContext`].
#[derive(Clone)]
pub struct FinsuppClient {
  http: reqwest::Client,
  base_url: Url,
  auth: AuthContext,
}

impl FinsuppClient {
  pub fn new(config: &ApiConfig, auth: AuthContext) -> Result<Self> {
    // Url::join drops the last path segment unless it ends with a slash
    let mut base = config.url.trim().to_string();
    if !base.ends_with('/') {
      base.push('/');
    }

    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API URL {}: {}", config.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      auth,
    })
  }

  pub fn auth(&self) -> &AuthContext {
    &self.auth
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
    let url = self.base_url.join(path)?;
    debug!(%method, %url, "Sending request");

    let request = self.http.request(method, url);
    Ok(match self.auth.token() {
      Some(token) => request.bearer_auth(token),
      None => request,
    })
  }

  /// Send a request, turning non-success statuses into `RemoteError::Rejected`.
  async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "Request rejected");

    Err(RemoteError::Rejected {
      status: status.as_u16(),
      message: error_advisory(&body, status.as_u16()),
    })
  }

  async fn get_list<T: DeserializeOwned>(
    &self,
    path: &str,
    paged: bool,
  ) -> Result<Option<Vec<T>>, RemoteError> {
    let mut request = self.request(Method::GET, path)?;
    if paged {
      request = request.query(&[("page", PAGE), ("size", PAGE_SIZE)]);
    }

    let body: ApiListResponse<T> = self.send(request).await?.json().await?;
    debug!(
      path,
      message = body.message.as_deref().unwrap_or_default(),
      count = body.data_list.as_ref().map(Vec::len),
      "Listing received"
    );

    Ok(body.data_list)
  }

  // ==========================================================================
  // Auth
  // ==========================================================================

  /// Log in; the caller decides what to do with the returned token.
  pub async fn login(&self, email: &str, password: &str) -> Result<UserData, RemoteError> {
    let request = self
      .request(Method::POST, "auth/login")?
      .json(&LoginRequest { email, password });

    let response = self.send(request).await?;
    let status = response.status().as_u16();
    let body: LoginResponse = response.json().await?;

    if !body.is_success() {
      return Err(RemoteError::Rejected {
        status,
        message: body
          .message
          .unwrap_or_else(|| "Login refused".to_string()),
      });
    }

    body
      .data
      .ok_or_else(|| RemoteError::Malformed("login response carried no user data".to_string()))
  }

  /// Create a user; on success the server logs them in right away.
  pub async fn register(
    &self,
    name: &str,
    email: &str,
    password: &str,
  ) -> Result<UserData, RemoteError> {
    let request = self
      .request(Method::POST, "auth/register")?
      .json(&RegisterRequest {
        name,
        email,
        password,
      });

    let body: LoginResponse = self.send(request).await?.json().await?;

    body.data.ok_or_else(|| {
      RemoteError::Malformed("register response carried no user data".to_string())
    })
  }

  // ==========================================================================
  // Accounts
  // ==========================================================================

  /// List the user's accounts; `None` when the server sent no list.
  pub async fn list_accounts(&self) -> Result<Option<Vec<Account>>, RemoteError> {
    self.get_list("accounts/", true).await
  }

  pub async fn create_account(&self, account: &AccountRequest) -> Result<(), RemoteError> {
    let request = self.request(Method::POST, "accounts/")?.json(account);
    self.send(request).await?;
    Ok(())
  }

  pub async fn update_account(&self, id: i64, account: &AccountRequest) -> Result<(), RemoteError> {
    let request = self
      .request(Method::PUT, &format!("accounts/{}", id))?
      .json(account);
    self.send(request).await?;
    Ok(())
  }

  pub async fn delete_account(&self, id: i64) -> Result<(), RemoteError> {
    let request = self.request(Method::DELETE, &format!("accounts/{}", id))?;
    self.send(request).await?;
    Ok(())
  }

  // ==========================================================================
  // Reference data
  // ==========================================================================

  pub async fn list_banks(&self) -> Result<Vec<Bank>, RemoteError> {
    Ok(self.get_list("bank/", false).await?.unwrap_or_default())
  }

  pub async fn list_categories(&self) -> Result<Vec<Category>, RemoteError> {
    Ok(self.get_list("categories/", false).await?.unwrap_or_default())
  }

  // ==========================================================================
  // Transactions
  // ==========================================================================

  pub async fn list_transactions(&self) -> Result<Vec<Transaction>, RemoteError> {
    Ok(self.get_list("transactions/", true).await?.unwrap_or_default())
  }

  pub async fn create_transaction(
    &self,
    transaction: &CreateTransactionRequest,
  ) -> Result<(), RemoteError> {
    let request = self.request(Method::POST, "transactions/")?.json(transaction);
    self.send(request).await?;
    Ok(())
  }

  pub async fn delete_transaction(&self, id: i64) -> Result<(), RemoteError> {
    let request = self.request(Method::DELETE, &format!("transactions/{}", id))?;
    self.send(request).await?;
    Ok(())
  }
}
