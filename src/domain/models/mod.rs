pub mod job;
pub mod message;
pub mod quota;

pub use job::Job;
pub use message::{Message, MessageClass, MessagePayload, MessageStatus};
pub use quota::TenantQuota;
