mod manager;

pub use manager::{ChatManager, ChatReply};
