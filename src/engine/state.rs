use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form accumulator data shared by custom actions and predicates
pub type ContextMap = serde_json::Map<String, Value>;

/// Progress of one run: where it is, what it has gathered, and where it has been
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub current: String,

    #[serde(default)]
    pub context: ContextMap,

    /// Names of states already left, oldest first
    #[serde(default)]
    pub history: Vec<String>,
}

impl RunState {
    pub fn new(initial: impl Into<String>, context: ContextMap) -> Self {
        Self {
            current: initial.into(),
            context,
            history: Vec::new(),
        }
    }

    /// Record the current state in `history` and move to `next`
    pub fn transition_to(&mut self, next: impl Into<String>) {
        let previous = std::mem::replace(&mut self.current, next.into());
        self.history.push(previous);
    }
}
