//! HTTP plumbing shared by the session manager and the API client

pub mod api;
pub mod envelope;
pub mod transport;

pub use api::ApiClient;
pub use envelope::Envelope;
pub use transport::HttpTransport;
