pub mod code_problem;
pub mod event;
pub mod guild;
pub mod guild_member;
pub mod language;
pub mod language_detail;
pub mod room;
pub mod room_player;
pub mod submission;
pub mod test_case;
