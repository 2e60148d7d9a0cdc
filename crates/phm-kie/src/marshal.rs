//! Translation between pipeline facts and the KIE server JSON marshalling.
//!
//! The server expects custom fact objects wrapped in their fully qualified
//! class name (`{"com.example.Trigger": {...}}`) and returns them the same
//! way. On the way back in, wrapped objects are flattened into the
//! `{"type": "<SimpleName>", ...}` form that [`Fact`] understands.

use phm_model::{
  ContainerInfo, FACT_TYPE_FIELD, Fact, FactMap, ProcessDefinition, ProcessVariables,
  ResultFactSet, ResultValue,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::KieError;

/// Out identifiers requested for every batch.
pub(crate) const FIRED_RULES_OUT: &str = phm_model::FIRED_RULES;
pub(crate) const FACT_OBJECTS_OUT: &str = phm_model::RESULT_FACT_OBJECTS;

/// Standard service response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ServiceResponse<T> {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub msg: Option<String>,
  pub result: Option<T>,
}

impl<T> ServiceResponse<T> {
  pub fn into_result(self) -> Result<T, KieError> {
    if self.kind != "SUCCESS" {
      return Err(KieError::Rejected {
        message: self
          .msg
          .unwrap_or_else(|| format!("service response type {}", self.kind)),
      });
    }
    self
      .result
      .ok_or_else(|| KieError::InvalidResponse("service response has no result".to_string()))
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerInfoResult {
  #[serde(rename = "kie-server-info")]
  pub info: ServerInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerInfo {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub version: Option<String>,
  #[serde(default)]
  pub capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContainersResult {
  #[serde(rename = "kie-containers")]
  pub containers: ContainerList,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContainerList {
  #[serde(rename = "kie-container", default)]
  pub items: Vec<ContainerResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContainerResource {
  #[serde(rename = "container-id")]
  pub container_id: String,
  #[serde(rename = "release-id", default)]
  pub release_id: Option<ReleaseId>,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseId {
  #[serde(rename = "group-id")]
  pub group_id: String,
  #[serde(rename = "artifact-id")]
  pub artifact_id: String,
  pub version: String,
}

impl From<ContainerResource> for ContainerInfo {
  fn from(resource: ContainerResource) -> Self {
    ContainerInfo {
      container_id: resource.container_id,
      release_id: resource
        .release_id
        .map(|r| format!("{}:{}:{}", r.group_id, r.artifact_id, r.version)),
      status: resource.status,
    }
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessDefinitionList {
  #[serde(default)]
  pub processes: Vec<ProcessDefinitionResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessDefinitionResource {
  #[serde(rename = "process-id")]
  pub id: String,
  #[serde(rename = "process-name", default)]
  pub name: Option<String>,
  #[serde(rename = "process-version", default)]
  pub version: Option<String>,
  #[serde(rename = "container-id")]
  pub container_id: String,
}

impl From<ProcessDefinitionResource> for ProcessDefinition {
  fn from(resource: ProcessDefinitionResource) -> Self {
    ProcessDefinition {
      id: resource.id,
      name: resource.name,
      version: resource.version,
      container_id: resource.container_id,
    }
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecutionResultsEnvelope {
  #[serde(rename = "execution-results")]
  pub execution_results: ExecutionResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecutionResults {
  #[serde(default)]
  pub results: Vec<KeyedValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyedValue {
  pub key: String,
  pub value: Value,
}

/// Build the batch-execution body: one insert per fact, then fire all rules
/// and collect the session's objects.
pub(crate) fn batch_command(session_name: &str, facts: FactMap, model_package: &str) -> Value {
  let mut commands: Vec<Value> = facts
    .into_iter()
    .map(|(key, fact)| {
      json!({
        "insert": {
          "object": wrap_fact(fact, model_package),
          "out-identifier": key,
          "return-object": true,
        }
      })
    })
    .collect();

  commands.push(json!({ "fire-all-rules": { "out-identifier": FIRED_RULES_OUT } }));
  commands.push(json!({ "get-objects": { "out-identifier": FACT_OBJECTS_OUT } }));

  json!({
    "lookup": session_name,
    "commands": commands,
  })
}

/// Decode the execution results into a result set.
pub(crate) fn result_fact_set(results: ExecutionResults) -> ResultFactSet {
  results
    .results
    .into_iter()
    .map(|KeyedValue { key, value }| {
      let value = match value {
        Value::Array(items) => ResultValue::Facts(items.into_iter().map(unwrap_fact).collect()),
        other => ResultValue::Fact(unwrap_fact(other)),
      };
      (key, value)
    })
    .collect()
}

/// Build the process-start body. Typed facts inside the variables, alone or
/// in a list such as `pDataList`, are class-wrapped like batch inserts so the
/// process receives model objects; plain values pass through untouched.
pub(crate) fn process_variables(variables: ProcessVariables, model_package: &str) -> Value {
  let wrapped = variables
    .into_inner()
    .into_iter()
    .map(|(name, value)| {
      let value = match value {
        Value::Array(items) => Value::Array(
          items
            .into_iter()
            .map(|item| wrap_fact(Fact::from(item), model_package))
            .collect(),
        ),
        Value::Object(_) => wrap_fact(Fact::from(value), model_package),
        other => other,
      };
      (name, value)
    })
    .collect();
  Value::Object(wrapped)
}

fn wrap_fact(fact: Fact, model_package: &str) -> Value {
  let class = match &fact {
    Fact::Other(_) => None,
    typed => Some(format!("{}.{}", model_package, typed.kind())),
  };
  let Some(class) = class else {
    return Value::from(fact);
  };

  let mut fields = match Value::from(fact) {
    Value::Object(map) => map,
    other => return other,
  };
  fields.remove(FACT_TYPE_FIELD);

  let mut wrapped = Map::new();
  wrapped.insert(class, Value::Object(fields));
  Value::Object(wrapped)
}

fn unwrap_fact(value: Value) -> Fact {
  let Value::Object(map) = value else {
    return Fact::from(value);
  };

  // A class-wrapped object has exactly one qualified key holding an object.
  let is_wrapped = map.len() == 1
    && map
      .iter()
      .next()
      .is_some_and(|(k, v)| k.contains('.') && v.is_object());

  if !is_wrapped {
    return Fact::from(Value::Object(map));
  }

  let mut flattened = Map::new();
  for (class, inner) in map {
    let simple_name = class.rsplit('.').next().unwrap_or(class.as_str()).to_string();
    flattened.insert(FACT_TYPE_FIELD.to_string(), Value::String(simple_name));
    if let Value::Object(fields) = inner {
      flattened.extend(fields);
    }
  }
  Fact::from(Value::Object(flattened))
}

#[cfg(test)]
mod tests {
  use super::*;
  use phm_model::Trigger;

  const PKG: &str = "com.health_insurance.phm_model";

  #[test]
  fn test_batch_command() {
    let facts = FactMap::from_trigger(Trigger::new("T1", "M1"));
    let body = batch_command("phm-session", facts, PKG);

    assert_eq!(
      body,
      json!({
        "lookup": "phm-session",
        "commands": [
          {"insert": {
            "object": {"com.health_insurance.phm_model.Trigger": {"triggerId": "T1", "memberId": "M1"}},
            "out-identifier": "insertedFactObject_T1",
            "return-object": true
          }},
          {"fire-all-rules": {"out-identifier": "firedRules"}},
          {"get-objects": {"out-identifier": "resultFactObjects"}}
        ]
      })
    );
  }

  #[test]
  fn test_result_fact_set_unwraps_classes() {
    let results: ExecutionResults = serde_json::from_value(json!({
      "results": [
        {"key": "firedRules", "value": 2},
        {"key": "resultFactObjects", "value": [
          {"com.health_insurance.phm_model.Response": {"value": 42}},
          {"com.health_insurance.phm_model.Trigger": {"triggerId": "T1", "memberId": "M1"}},
          {"com.health_insurance.phm_model.Reminder": {"days": 7}}
        ]}
      ]
    }))
    .unwrap();

    let set = result_fact_set(results);
    let objects = set.fact_objects();
    assert_eq!(objects.len(), 3);
    assert_eq!(
      objects[0].as_response().and_then(|r| r.get("value")),
      Some(&json!(42))
    );
    assert_eq!(objects[1], Fact::Trigger(Trigger::new("T1", "M1")));
    assert_eq!(objects[2].kind(), "Reminder");
    assert_eq!(set.responses().len(), 1);
  }

  #[test]
  fn test_process_variables_wrap_responses() {
    let mut variables = ProcessVariables::new();
    variables.insert(
      "pDataList",
      json!([{"type": "Response", "value": 42}, {"note": "as is"}, 7]),
    );
    variables.insert("pMemberId", json!("M1"));
    variables.insert("pTrigger", json!({"type": "Trigger", "triggerId": "T1", "memberId": "M1"}));

    assert_eq!(
      process_variables(variables, PKG),
      json!({
        "pDataList": [
          {"com.health_insurance.phm_model.Response": {"value": 42}},
          {"note": "as is"},
          7
        ],
        "pMemberId": "M1",
        "pTrigger": {"com.health_insurance.phm_model.Trigger": {"triggerId": "T1", "memberId": "M1"}}
      })
    );
  }

  #[test]
  fn test_process_variables_empty_list() {
    let variables = ProcessVariables::from_responses(vec![]);
    assert_eq!(process_variables(variables, PKG), json!({"pDataList": []}));
  }

  #[test]
  fn test_unwrap_plain_values() {
    assert_eq!(unwrap_fact(json!(5)), Fact::Other(json!(5)));
    // Two keys: not a class wrapper.
    let plain = json!({"a.b": {}, "c": 1});
    assert_eq!(unwrap_fact(plain.clone()), Fact::Other(plain));
  }
}
