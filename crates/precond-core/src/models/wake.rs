//! Wake state machine states

use std::fmt;

/// State of one wake orchestration run.
///
/// ```text
/// Unknown ──wake──▶ WokenRequested ──(reported online)──▶ Online
///                          │
///                          ▼
///                       Polling ──(poll online + settle)──▶ Online
///                          │
///                          └──(poll budget exhausted)──▶ TimedOut
/// ```
///
/// `Online` and `TimedOut` are terminal. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeState {
    #[default]
    Unknown,
    WokenRequested,
    Polling,
    Online,
    TimedOut,
}

impl WakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Online | Self::TimedOut)
    }
}

impl fmt::Display for WakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::WokenRequested => write!(f, "woken_requested"),
            Self::Polling => write!(f, "polling"),
            Self::Online => write!(f, "online"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Result of a successful wake run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeOutcome {
    /// Terminal state reached (always `Online` for a successful run)
    pub state: WakeState,
    /// Number of state polls performed
    pub polls: u32,
}
