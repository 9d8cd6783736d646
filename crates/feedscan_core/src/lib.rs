//! Feed scanner core: pure scan state machine and feed data types.
mod effect;
mod feed;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, StopReason};
pub use feed::{Candidate, Card, FeedPage, Reaction, TypeFilter, NO_CANDIDATE, UPVOTE};
pub use msg::Msg;
pub use state::{Phase, ScanSession};
pub use update::update;
pub use view_model::ScanProgress;
