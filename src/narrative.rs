//! Boundary contract for the external text-generation collaborator.
//!
//! The core never blocks indefinitely on narrative generation: callers pass a
//! timeout and treat any error as "collaborator unavailable", degrading to the
//! static guidance message.

use std::time::Duration;

use anyhow::{Result, anyhow};

pub const DEFAULT_NARRATIVE_TIMEOUT: Duration = Duration::from_secs(20);

pub trait Narrator: Send + Sync {
    /// Produce free-form narrative text for a question. Implementations must
    /// return (or fail) within `timeout`; output is treated as untrusted and
    /// defensively parsed by the caller.
    fn generate(
        &self,
        system_instructions: &str,
        user_context: &str,
        timeout: Duration,
    ) -> Result<String>;
}

/// Default collaborator: declines immediately so unmatched questions fall
/// through to the guidance envelope.
pub struct DisabledNarrator;

impl Narrator for DisabledNarrator {
    fn generate(&self, _system: &str, _context: &str, _timeout: Duration) -> Result<String> {
        Err(anyhow!("narrative generation is not configured"))
    }
}

/// Static help shown when a question cannot be interpreted and the narrative
/// collaborator is unavailable.
pub fn guidance() -> String {
    [
        "I could not interpret that question. Supported phrasings include:",
        "  - average of AUTOESTIMA by PARALELO",
        "  - top 5 highest AUTOESTIMA",
        "  - students with AUTOESTIMA >= 70",
        "  - percentile of Ana Ruiz in AUTOESTIMA",
        "  - full report of Ana Ruiz",
        "  - show 10 rows",
    ]
    .join("\n")
}
