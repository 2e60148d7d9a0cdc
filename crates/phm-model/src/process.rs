//! Process-start inputs and engine diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fact::{Fact, Response};
use crate::trigger::Trigger;

/// Variable carrying the decision responses.
pub const DATA_LIST_VARIABLE: &str = "pDataList";
/// Variable carrying the member id when a process is started straight from a trigger.
pub const MEMBER_ID_VARIABLE: &str = "pMemberId";
/// Variable carrying the trigger id when a process is started straight from a trigger.
pub const TRIGGER_ID_VARIABLE: &str = "pTriggerId";

/// Variables handed verbatim to a new process instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessVariables(Map<String, Value>);

impl ProcessVariables {
  pub fn new() -> Self {
    Self::default()
  }

  /// `{"pDataList": [<responses>]}`.
  pub fn from_responses(responses: Vec<Response>) -> Self {
    let list = responses
      .into_iter()
      .map(|response| Value::from(Fact::Response(response)))
      .collect();

    let mut variables = Self::new();
    variables.insert(DATA_LIST_VARIABLE, Value::Array(list));
    variables
  }

  /// `{"pMemberId": .., "pTriggerId": ..}`.
  pub fn from_trigger(trigger: &Trigger) -> Self {
    let mut variables = Self::new();
    variables.insert(MEMBER_ID_VARIABLE, Value::from(trigger.member_id()));
    variables.insert(TRIGGER_ID_VARIABLE, Value::from(trigger.trigger_id()));
    variables
  }

  pub fn insert(&mut self, name: impl Into<String>, value: Value) {
    self.0.insert(name.into(), value);
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.0.get(name)
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn into_inner(self) -> Map<String, Value> {
    self.0
  }
}

/// Identifier of a started process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessInstanceId(pub i64);

impl fmt::Display for ProcessInstanceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A deployment unit on the engine server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
  pub container_id: String,
  /// `group:artifact:version` of the deployed project, when reported.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub release_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

/// A process definition deployed in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub version: Option<String>,
  pub container_id: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_from_responses() {
    let mut fields = Map::new();
    fields.insert("value".to_string(), json!(42));
    let variables = ProcessVariables::from_responses(vec![Response::new(fields)]);

    assert_eq!(
      serde_json::to_value(&variables).unwrap(),
      json!({"pDataList": [{"type": "Response", "value": 42}]})
    );
  }

  #[test]
  fn test_from_no_responses() {
    let variables = ProcessVariables::from_responses(vec![]);
    assert_eq!(variables.get(DATA_LIST_VARIABLE), Some(&json!([])));
  }

  #[test]
  fn test_from_trigger() {
    let variables = ProcessVariables::from_trigger(&Trigger::new("T1", "M1"));
    assert_eq!(
      serde_json::to_value(&variables).unwrap(),
      json!({"pMemberId": "M1", "pTriggerId": "T1"})
    );
  }

  #[test]
  fn test_instance_id_display() {
    assert_eq!(ProcessInstanceId(17).to_string(), "17");
    assert_eq!(serde_json::to_string(&ProcessInstanceId(17)).unwrap(), "17");
  }
}
