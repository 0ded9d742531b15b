pub mod app;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod streak;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use store::QuitStore;
