pub mod deliverer;
pub mod queue;
pub mod quota;
pub mod retry;
