pub mod enqueue_message;
pub mod get_message;
