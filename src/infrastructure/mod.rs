pub mod providers;
pub mod queue;
pub mod repositories;
