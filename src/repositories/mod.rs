pub mod communities;
pub mod conversations;
pub mod groups;
pub mod messages;
pub mod notifications;
pub mod read_receipts;
