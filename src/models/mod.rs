pub mod communities;
pub mod containers;
pub mod conversations;
pub mod groups;
pub mod inbox;
pub mod messages;
pub mod read_markers;
pub mod viewers;

pub type UserId = i64;
pub type MessageId = u64;
pub type PostId = u64;
