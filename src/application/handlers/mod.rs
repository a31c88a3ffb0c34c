pub mod dispatch;
pub mod worker_pool;
