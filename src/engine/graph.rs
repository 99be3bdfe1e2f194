use crate::error::Result;
use crate::resolver::ResolveSpec;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declarative automation: named states and the transitions between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateGraph {
    pub initial_state: String,

    /// States in authored order
    pub states: IndexMap<String, StateDef>,
}

/// One state of a [`StateGraph`]
///
/// When both `action` and `check` are set the action runs first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionSpec>,

    /// Name of a registered predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_true: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_false: Option<String>,

    /// Taken when `resolve` finds nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_missing: Option<String>,

    /// Taken when the action reports failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    /// Proceed without an element when `resolve` finds nothing
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// What a state does with its resolved element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionSpec {
    Click,

    /// Type `text` character by character
    Type { text: String },

    /// Scroll the element into view
    Scroll,

    /// Sleep `ms`, or a random duration in `[ms, maxMs]`
    Wait {
        ms: u64,
        #[serde(default, rename = "maxMs", skip_serializing_if = "Option::is_none")]
        max_ms: Option<u64>,
    },

    /// Invoke a registered custom action
    Custom { capability: String },
}

impl ActionSpec {
    pub fn custom(capability: impl Into<String>) -> Self {
        Self::Custom {
            capability: capability.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type { .. } => "type",
            Self::Scroll => "scroll",
            Self::Wait { .. } => "wait",
            Self::Custom { .. } => "custom",
        }
    }
}

impl StateDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolve(mut self, resolve: ResolveSpec) -> Self {
        self.resolve = Some(resolve);
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_check(mut self, predicate: impl Into<String>) -> Self {
        self.check = Some(predicate.into());
        self
    }

    pub fn with_next(mut self, state: impl Into<String>) -> Self {
        self.next = Some(state.into());
        self
    }

    pub fn with_on_true(mut self, state: impl Into<String>) -> Self {
        self.on_true = Some(state.into());
        self
    }

    pub fn with_on_false(mut self, state: impl Into<String>) -> Self {
        self.on_false = Some(state.into());
        self
    }

    pub fn with_on_missing(mut self, state: impl Into<String>) -> Self {
        self.on_missing = Some(state.into());
        self
    }

    pub fn with_fallback(mut self, state: impl Into<String>) -> Self {
        self.fallback = Some(state.into());
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Every transition target this state names, with the field it came from
    pub fn targets(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("next", &self.next),
            ("onTrue", &self.on_true),
            ("onFalse", &self.on_false),
            ("onMissing", &self.on_missing),
            ("fallback", &self.fallback),
        ]
        .into_iter()
        .filter_map(|(field, target)| target.as_deref().map(|t| (field, t)))
    }

    /// No way out: reaching this state ends the run
    pub fn is_terminal(&self) -> bool {
        self.next.is_none() && self.check.is_none() && self.on_true.is_none() && self.on_false.is_none()
    }
}

/// Static problem found by [`StateGraph::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    MissingInitialState(String),
    DanglingTarget {
        state: String,
        field: &'static str,
        target: String,
    },
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInitialState(name) => write!(f, "initial state '{}' is not defined", name),
            Self::DanglingTarget { state, field, target } => {
                write!(f, "state '{}' {} -> '{}' is not defined", state, field, target)
            }
        }
    }
}

impl StateGraph {
    pub fn new(initial_state: impl Into<String>) -> Self {
        Self {
            initial_state: initial_state.into(),
            states: IndexMap::new(),
        }
    }

    /// Builder method: add (or replace) a state
    pub fn with_state(mut self, name: impl Into<String>, def: StateDef) -> Self {
        self.states.insert(name.into(), def);
        self
    }

    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Every reference to an undefined state
    pub fn validate(&self) -> Vec<GraphIssue> {
        let mut issues = Vec::new();
        if !self.contains(&self.initial_state) {
            issues.push(GraphIssue::MissingInitialState(self.initial_state.clone()));
        }

        for (name, def) in &self.states {
            for (field, target) in def.targets() {
                if !self.contains(target) {
                    issues.push(GraphIssue::DanglingTarget {
                        state: name.clone(),
                        field,
                        target: target.to_string(),
                    });
                }
            }
        }
        issues
    }

    /// Names of registered capabilities the graph refers to: (custom actions, predicates)
    pub fn capabilities(&self) -> (Vec<&str>, Vec<&str>) {
        let actions = self
            .states
            .values()
            .filter_map(|def| match &def.action {
                Some(ActionSpec::Custom { capability }) => Some(capability.as_str()),
                _ => None,
            })
            .collect();
        let predicates = self.states.values().filter_map(|def| def.check.as_deref()).collect();
        (actions, predicates)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON Schema for graph files
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(StateGraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_graph() -> StateGraph {
        StateGraph::new("A")
            .with_state("A", StateDef::new().with_action(ActionSpec::custom("bump")).with_next("B"))
            .with_state(
                "B",
                StateDef::new().with_check("belowThree").with_on_true("A").with_on_false("FINISH"),
            )
            .with_state("FINISH", StateDef::new())
    }

    #[test]
    fn test_valid_graph() {
        let graph = counter_graph();
        assert!(graph.validate().is_empty());
        assert!(graph.state("FINISH").unwrap().is_terminal());
        assert!(!graph.state("B").unwrap().is_terminal());
        assert_eq!(graph.capabilities(), (vec!["bump"], vec!["belowThree"]));
    }

    #[test]
    fn test_validate_reports_dangling_targets() {
        let graph = counter_graph()
            .with_state("C", StateDef::new().with_fallback("nowhere").with_on_missing("FINISH"));
        let mut bad = graph.clone();
        bad.initial_state = "start".into();

        assert_eq!(
            bad.validate(),
            vec![
                GraphIssue::MissingInitialState("start".into()),
                GraphIssue::DanglingTarget {
                    state: "C".into(),
                    field: "fallback",
                    target: "nowhere".into()
                },
            ]
        );
        assert_eq!(
            bad.validate()[1].to_string(),
            "state 'C' fallback -> 'nowhere' is not defined"
        );
    }

    #[test]
    fn test_graph_json_shape() {
        let graph = StateGraph::from_json(
            &json!({
                "initialState": "find",
                "states": {
                    "find": {
                        "resolve": { "role": "button", "nameMatcher": "Next", "selector": "a.next" },
                        "action": { "type": "click" },
                        "onMissing": "done",
                        "fallback": "done",
                        "next": "pause"
                    },
                    "pause": { "action": { "type": "wait", "ms": 500, "maxMs": 900 }, "next": "find" },
                    "type": { "action": { "type": "type", "text": "it's \"quoted\"" }, "optional": true },
                    "done": {}
                }
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(graph.states.keys().collect::<Vec<_>>(), vec!["find", "pause", "type", "done"]);
        assert_eq!(
            graph.state("pause").unwrap().action,
            Some(ActionSpec::Wait {
                ms: 500,
                max_ms: Some(900)
            })
        );
        assert!(graph.state("type").unwrap().optional);

        let round_trip = StateGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, graph);
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let result = StateGraph::from_json(r#"{"initialState":"a","states":{"a":{"action":{"type":"hover"}}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_mentions_states() {
        let schema = serde_json::to_string(&StateGraph::json_schema()).unwrap();
        assert!(schema.contains("initialState"));
        assert!(schema.contains("nameMatcher"));
    }
}
