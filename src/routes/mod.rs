// Export all route modules
pub mod leads;

// Re-export all route handlers for easy importing
pub use leads::*;
