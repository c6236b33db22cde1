mod client;
mod error;
pub mod http;
mod query;
mod refresh;
mod request;
mod session;

pub use client::{ApiClient, ApiClientBuilder, ClientConfig};
pub use error::{ApiError, ApiErrorKind, GENERIC_ERROR_MESSAGE};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use query::to_query_string;
pub use request::ApiRequest;
pub use session::{ListenerId, SessionEnd, SessionEvents, UnauthorizedHandler};
