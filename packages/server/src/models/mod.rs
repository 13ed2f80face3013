pub mod room;
pub mod shared;
pub mod submission;
