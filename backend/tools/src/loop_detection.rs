/// Tool loop detection — stops an agent that keeps issuing the same call,
/// or ping-pongs between two calls, without making progress.
///
/// Works on call signatures (`name:canonical-args`), so a failing tool is
/// caught just like a succeeding one.
use std::collections::VecDeque;

/// Default number of signatures kept.
pub const DEFAULT_WINDOW: usize = 15;

/// Identical consecutive signatures that count as a stall.
pub const EXACT_REPEAT_THRESHOLD: usize = 3;

/// Length of the A,B,A,B,A,B pattern that counts as a stall.
pub const ALTERNATION_SPAN: usize = 6;

/// A detected repetition pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stall {
    /// The last calls were all the same signature.
    ExactRepeat { signature: String },
    /// The last calls alternated between two distinct signatures.
    Alternation { first: String, second: String },
}

impl Stall {
    /// User-facing explanation appended as the run's final answer.
    pub fn message(&self) -> String {
        match self {
            Stall::ExactRepeat { signature } => format!(
                "⚠️ I stopped because I called `{}` with the same arguments {} times in a row \
                 without making progress. Please rephrase the request or provide more detail.",
                tool_name(signature),
                EXACT_REPEAT_THRESHOLD
            ),
            Stall::Alternation { first, second } => format!(
                "⚠️ I stopped because I kept alternating between `{}` and `{}` without \
                 making progress. Please rephrase the request or provide more detail.",
                tool_name(first),
                tool_name(second)
            ),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Stall::ExactRepeat { .. } => "exact_repeat",
            Stall::Alternation { .. } => "alternation",
        }
    }
}

fn tool_name(signature: &str) -> &str {
    signature.split(':').next().unwrap_or(signature)
}

/// Rolling window of recent call signatures for a single run.
#[derive(Debug, Clone)]
pub struct LoopDetector {
    window: VecDeque<String>,
    capacity: usize,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl LoopDetector {
    /// The capacity never drops below what the alternation rule needs.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(ALTERNATION_SPAN);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a signature and return the stall it completes, if any.
    pub fn record(&mut self, signature: impl Into<String>) -> Option<Stall> {
        self.window.push_back(signature.into());
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.detect()
    }

    fn detect(&self) -> Option<Stall> {
        let n = self.window.len();

        if n >= EXACT_REPEAT_THRESHOLD {
            let last = &self.window[n - 1];
            if self
                .window
                .range(n - EXACT_REPEAT_THRESHOLD..)
                .all(|s| s == last)
            {
                return Some(Stall::ExactRepeat {
                    signature: last.clone(),
                });
            }
        }

        if n >= ALTERNATION_SPAN {
            let tail: Vec<&String> = self.window.range(n - ALTERNATION_SPAN..).collect();
            let (a, b) = (tail[0], tail[1]);
            let alternates = a != b
                && tail
                    .iter()
                    .enumerate()
                    .all(|(i, s)| *s == if i % 2 == 0 { a } else { b });
            if alternates {
                return Some(Stall::Alternation {
                    first: a.clone(),
                    second: b.clone(),
                });
            }
        }

        None
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reset the detector for a new run.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}
