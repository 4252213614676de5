// Domain layer - Report value types
pub mod dashboard;
pub mod time_range;
pub mod variables;
