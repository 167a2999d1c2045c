pub mod communities;
pub mod conversations;
pub mod groups;
pub mod messages;
