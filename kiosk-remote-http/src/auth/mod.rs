pub mod middleware;

// Re-export for easier imports
pub use middleware::*;
