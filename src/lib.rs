pub mod auth;
pub mod chaos;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod handler;
pub mod logging;
pub mod response;
pub mod server;
pub mod state;
pub mod tls;

pub use auth::{AuthValidator, Credentials, HttpIntrospector, Introspector};
pub use chaos::{ChaosPolicy, FixedChaos, RandomChaos};
pub use config::Config;
pub use error::ServerError;
pub use handler::{HandlerConfig, ManagementHandler, RequestHandler};
pub use server::{DummyServer, EndpointKind};
pub use state::{RequestRecord, SharedState};
