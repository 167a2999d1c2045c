pub mod communities;
pub mod containers;
pub mod conversations;
pub mod groups;
pub mod messages;
pub mod read_state;
