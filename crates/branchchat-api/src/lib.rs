pub mod auth;
pub mod chat;
pub mod documents;
pub mod error;
pub mod health;
pub mod middleware;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod tree;

pub use error::ApiError;
pub use orchestrator::{Orchestrator, Turn, TurnError, TurnInput};
pub use routes::router;
pub use state::{AppState, AppStateInner, AuthConfig};
