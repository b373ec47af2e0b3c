//! Mirror core: pure state fold over pipeline progress messages.
mod msg;
mod state;
mod update;
mod view_model;

pub use msg::{Msg, QueueSnapshot, RunPhase};
pub use state::MirrorState;
pub use update::update;
pub use view_model::{LogEntry, LogKind, MirrorView};
