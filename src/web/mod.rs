pub mod server;
pub mod api;
pub mod state;

pub use server::*;
pub use state::*;
