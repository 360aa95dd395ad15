// Typewriter Reveal Scheduler
//
// Presentation-only pacing of finalized assistant text: one character per
// tick, as a cancellable scheduled task keyed by message id. Entirely
// downstream of the timeline; cancelling or completing a reveal never
// touches session state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default delay between revealed characters
pub const DEFAULT_REVEAL_TICK: Duration = Duration::from_millis(30);

/// One step of a running reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    /// Timeline record being revealed
    pub message_id: String,
    /// Currently visible prefix
    pub visible: String,
    /// Whether the full content is now visible
    pub done: bool,
}

struct RevealShared {
    content: Mutex<String>,
    finished: AtomicBool,
}

struct RevealTask {
    handle: JoinHandle<()>,
    shared: Arc<RevealShared>,
}

/// Schedules character-by-character reveals of finalized assistant text
pub struct RevealScheduler {
    tick: Duration,
    frames: mpsc::UnboundedSender<RevealFrame>,
    tasks: HashMap<String, RevealTask>,
}

impl RevealScheduler {
    /// Create a scheduler plus the ordered stream of reveal frames
    pub fn new(tick: Duration) -> (Self, mpsc::UnboundedReceiver<RevealFrame>) {
        let (frames, receiver) = mpsc::unbounded_channel();
        (
            Self {
                tick,
                frames,
                tasks: HashMap::new(),
            },
            receiver,
        )
    }

    /// Begin revealing `content` for the record `message_id`
    ///
    /// If a reveal is already running for the id, the text is swapped and
    /// the reveal continues from its current position instead of starting
    /// over. A reveal that already completed starts fresh.
    pub fn begin(&mut self, message_id: impl Into<String>, content: impl Into<String>) {
        let message_id = message_id.into();
        let content = content.into();

        if let Some(task) = self.tasks.get(&message_id) {
            if !task.shared.finished.load(Ordering::SeqCst) {
                self.update(&message_id, content);
                return;
            }
            if let Some(task) = self.tasks.remove(&message_id) {
                task.handle.abort();
            }
        }

        let shared = Arc::new(RevealShared {
            content: Mutex::new(content),
            finished: AtomicBool::new(false),
        });
        let handle = tokio::spawn(run_reveal(
            message_id.clone(),
            shared.clone(),
            self.tick,
            self.frames.clone(),
        ));
        self.tasks.insert(message_id, RevealTask { handle, shared });
    }

    /// Swap the text of a running reveal, keeping its position
    ///
    /// Returns `false` when no reveal is running for the id.
    pub fn update(&mut self, message_id: &str, content: impl Into<String>) -> bool {
        match self.tasks.get(message_id) {
            Some(task) if !task.shared.finished.load(Ordering::SeqCst) => {
                if let Ok(mut guard) = task.shared.content.lock() {
                    *guard = content.into();
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Cancel the reveal for `message_id`, if one is running
    pub fn cancel(&mut self, message_id: &str) -> bool {
        if let Some(task) = self.tasks.remove(message_id) {
            task.handle.abort();
            true
        } else {
            false
        }
    }

    /// Cancel every running reveal (e.g. the timeline was cleared)
    pub fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.handle.abort();
        }
    }
}

impl Drop for RevealScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_reveal(
    message_id: String,
    shared: Arc<RevealShared>,
    tick: Duration,
    frames: mpsc::UnboundedSender<RevealFrame>,
) {
    let mut interval = tokio::time::interval(tick);
    let mut position = 0usize;

    loop {
        interval.tick().await;

        let content = match shared.content.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => break,
        };

        let total = content.chars().count();
        if position < total {
            position += 1;
        }
        let visible: String = content.chars().take(position).collect();
        let done = position >= total;

        let frame = RevealFrame {
            message_id: message_id.clone(),
            visible,
            done,
        };
        if frames.send(frame).is_err() {
            break;
        }
        if done {
            shared.finished.store(true, Ordering::SeqCst);
            break;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
