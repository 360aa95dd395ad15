// Assistant Session Engine
//
// The streaming conversation core: decodes the typed event protocol
// arriving over the connection channel, accumulates partially generated
// text, extracts embedded thought segments, reconciles tool events into
// the timeline, and exposes a strictly ordered, render-ready message
// sequence. The optional typewriter reveal sits downstream of all of it.

pub mod accumulator;
pub mod channel;
pub mod error;
pub mod reveal;
pub mod session;
pub mod thoughts;
pub mod timeline;

// Re-export main types
pub use accumulator::StreamAccumulator;
pub use channel::{ChannelNotification, ConnectionChannel};
pub use error::{AssistantError, AssistantErrorCode, AssistantResult};
pub use reveal::{RevealFrame, RevealScheduler, DEFAULT_REVEAL_TICK};
pub use session::{
    drive_session, OutboundSink, SessionController, SessionObserver, SessionState,
    MAX_MESSAGE_CHARS,
};
pub use thoughts::{decompose, Decomposition};
pub use timeline::Timeline;
