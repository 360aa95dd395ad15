// Stream Accumulator
//
// Buffers the raw text of the generation turn currently in flight. The
// buffer exists only between start() and finalize(); every snapshot
// re-derives the thought/content split from the full buffer rather than
// keeping incremental parse state, trading recomputation for correctness.

use super::error::{AssistantError, AssistantResult};
use super::thoughts::{self, Decomposition};

/// Per-turn accumulation of streamed text
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    turn: Option<OpenTurn>,
}

#[derive(Debug)]
struct OpenTurn {
    turn_id: String,
    buffer: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self { turn: None }
    }

    /// Id of the open turn, if any
    pub fn turn_id(&self) -> Option<&str> {
        self.turn.as_ref().map(|turn| turn.turn_id.as_str())
    }

    /// Whether a turn is currently open
    pub fn is_open(&self) -> bool {
        self.turn.is_some()
    }

    /// Open a new turn
    ///
    /// Opening over an unfinalized turn is a protocol-ordering violation
    /// reported to the caller, not silently absorbed.
    pub fn start(&mut self, turn_id: impl Into<String>) -> AssistantResult<()> {
        if self.turn.is_some() {
            return Err(AssistantError::Protocol(
                "generation turn opened while another is in flight".to_string(),
            ));
        }
        self.turn = Some(OpenTurn {
            turn_id: turn_id.into(),
            buffer: String::new(),
        });
        Ok(())
    }

    /// Append a streamed fragment to the open turn
    pub fn append(&mut self, text: &str) -> AssistantResult<()> {
        match self.turn.as_mut() {
            Some(turn) => {
                turn.buffer.push_str(text);
                Ok(())
            }
            None => Err(AssistantError::Protocol(
                "token received with no open generation turn".to_string(),
            )),
        }
    }

    /// Current decomposition of the full buffer, for live preview
    pub fn snapshot(&self) -> AssistantResult<Decomposition> {
        match &self.turn {
            Some(turn) => Ok(thoughts::decompose(&turn.buffer)),
            None => Err(AssistantError::Protocol(
                "snapshot requested with no open generation turn".to_string(),
            )),
        }
    }

    /// Consume the open turn, returning its final decomposition
    pub fn finalize(&mut self) -> AssistantResult<Decomposition> {
        match self.turn.take() {
            Some(turn) => Ok(thoughts::decompose(&turn.buffer)),
            None => Err(AssistantError::Protocol(
                "generation turn closed but none is open".to_string(),
            )),
        }
    }

    /// Discard the open turn without producing output
    ///
    /// Returns whether a turn was open. Used when the service reports a
    /// failure so partial content is never finalized.
    pub fn abort(&mut self) -> bool {
        self.turn.take().is_some()
    }
}
