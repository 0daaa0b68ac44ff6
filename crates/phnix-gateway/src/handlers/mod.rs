mod cycle;
mod health;

pub use cycle::{generate_phn_handler, last_cycle_handler, trigger_cycle_handler};
pub use health::health_handler;
