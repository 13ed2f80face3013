pub mod events;
pub mod room;
pub mod submission;
