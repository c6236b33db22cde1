use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ApiError;
use super::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use super::refresh::RefreshGate;
use super::request::ApiRequest;
use super::session::{ListenerId, SessionEnd, SessionEvents, UnauthorizedHandler};

const REFRESH_ENDPOINT: &str = "/auth/refresh";
const LOGOUT_ENDPOINT: &str = "/auth/logout";

/// Connection settings for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }
}

/// Authenticated client for the Khailingo backend API
///
/// Credentials are session cookies kept by the transport. A 401 triggers one
/// silent refresh (shared between concurrent calls) and a single retry. A 403
/// logs the session out. Both unrecoverable cases are signalled through the
/// registered [`UnauthorizedHandler`]s.
///
/// Generic over the transport for testability.
pub struct ApiClient<H: HttpTransport = ReqwestTransport> {
    http: H,
    base_url: String,
    timeout: Option<Duration>,
    session: Arc<SessionEvents>,
    refresh: Arc<RefreshGate>,
}

impl ApiClient<ReqwestTransport> {
    /// Starts building a client with the default reqwest transport
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            config: ClientConfig::new(base_url),
            handler: None,
        }
    }
}

impl<H: HttpTransport> ApiClient<H> {
    /// Creates a client over a custom transport
    ///
    /// `config.timeout` is only recorded here; enforcing it is the
    /// transport's job.
    pub fn with_transport(config: ClientConfig, http: H) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            session: Arc::new(SessionEvents::new()),
            refresh: Arc::new(RefreshGate::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Replaces the handler told when the session cannot be recovered
    pub fn set_unauthorized_handler(&self, handler: Arc<dyn UnauthorizedHandler>) {
        self.session.set_handler(Some(handler));
    }

    /// Removes the handler set with [`Self::set_unauthorized_handler`]
    pub fn clear_unauthorized_handler(&self) {
        self.session.set_handler(None);
    }

    /// Registers an extra session-end listener alongside the primary handler
    pub fn subscribe_session_end(&self, handler: Arc<dyn UnauthorizedHandler>) -> ListenerId {
        self.session.subscribe(handler)
    }

    /// Removes a listener added with [`Self::subscribe_session_end`]
    pub fn unsubscribe_session_end(&self, id: ListenerId) -> bool {
        self.session.unsubscribe(id)
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(endpoint)).await
    }

    /// GET with query parameters; null and empty-string values are left out
    pub async fn get_with_params<T, Q>(&self, endpoint: &str, params: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(ApiRequest::get(endpoint).query(params)?).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(endpoint).json(body)?).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(endpoint).json(body)?).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::patch(endpoint).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::delete(endpoint)).await
    }

    /// Issues a request and returns the decoded JSON body
    ///
    /// The body is returned as the backend sent it; any response envelope is
    /// left for the caller to interpret.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let request = request.to_http(&self.base_url);
        let generation = self.refresh.generation();

        let mut response = self.execute(&request).await?;

        if response.is_unauthorized() {
            tracing::warn!(method = %request.method, url = %request.url, "Unauthorized, refreshing session");

            if !self.refresh.run(generation, || self.try_refresh()).await {
                self.session.notify(SessionEnd::RefreshFailed);
                return Err(ApiError::session_expired());
            }

            response = self.execute(&request).await?;

            if response.is_unauthorized() {
                tracing::warn!(method = %request.method, url = %request.url, "Still unauthorized after refresh");
                self.session.notify(SessionEnd::RetryRejected);
                return Err(ApiError::from_response(&response));
            }
        }

        if response.is_forbidden() {
            return Err(self.end_forbidden(&request, &response).await);
        }

        if !response.is_success() {
            let err = ApiError::from_response(&response);
            tracing::debug!(status = err.status, message = %err.message, "API error");
            return Err(err);
        }

        response
            .json()
            .map_err(|e| ApiError::decode(response.status, &e))
    }

    /// Asks the backend to renew the session cookies
    ///
    /// Shares the in-flight refresh with any call currently recovering from a 401.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        let generation = self.refresh.generation();
        if self.refresh.run(generation, || self.try_refresh()).await {
            Ok(())
        } else {
            Err(ApiError::session_expired())
        }
    }

    /// Ends the session on the backend
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .post_auth(LOGOUT_ENDPOINT)
            .await
            .map_err(|e| ApiError::network(&e))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_response(&response))
        }
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        let response = self.http.execute(request).await.map_err(|e| {
            tracing::debug!(url = %request.url, "Transport error: {:#}", e);
            ApiError::network(&e)
        })?;

        tracing::debug!(status = response.status, url = %request.url, "Received response");
        Ok(response)
    }

    async fn post_auth(&self, endpoint: &str) -> anyhow::Result<HttpResponse> {
        let request = ApiRequest::post(endpoint).to_http(&self.base_url);
        self.http.execute(&request).await
    }

    async fn try_refresh(&self) -> bool {
        match self.post_auth(REFRESH_ENDPOINT).await {
            Ok(response) if response.is_success() => {
                tracing::info!("Session refreshed");
                true
            }
            Ok(response) => {
                tracing::warn!(status = response.status, "Session refresh rejected");
                false
            }
            Err(e) => {
                tracing::warn!("Session refresh failed: {:#}", e);
                false
            }
        }
    }

    // Logout is awaited before the application is told to leave
    async fn end_forbidden(&self, request: &HttpRequest, response: &HttpResponse) -> ApiError {
        tracing::warn!(method = %request.method, url = %request.url, "Forbidden, ending session");

        if let Err(e) = self.logout().await {
            tracing::warn!(status = e.status, "Logout after 403 failed: {}", e);
        }

        self.session.notify(SessionEnd::Forbidden);
        ApiError::from_response(response)
    }
}

impl<H: HttpTransport + Clone> Clone for ApiClient<H> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            session: self.session.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

impl<H: HttpTransport> std::fmt::Debug for ApiClient<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    handler: Option<Arc<dyn UnauthorizedHandler>>,
}

impl ApiClientBuilder {
    /// Aborts requests that take longer than `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sets the initial session-end handler
    pub fn on_unauthorized(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Builds the client with a reqwest transport honouring the timeout
    pub fn build(self) -> anyhow::Result<ApiClient> {
        let transport = ReqwestTransport::new(self.config.timeout)?;
        Ok(self.build_with(transport))
    }

    /// Builds the client over a custom transport
    pub fn build_with<H: HttpTransport>(self, transport: H) -> ApiClient<H> {
        let client = ApiClient::with_transport(self.config, transport);
        if let Some(handler) = self.handler {
            client.set_unauthorized_handler(handler);
        }
        client
    }
}
