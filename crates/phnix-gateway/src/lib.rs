pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod scheduler;
pub mod state;

pub use app::App;
pub use state::AppState;
