//! Decision results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::{Fact, Response};

/// Result identifier under which the rule session returns its working memory.
pub const RESULT_FACT_OBJECTS: &str = "resultFactObjects";

/// Result identifier under which the rule session reports the fired rule count.
pub const FIRED_RULES: &str = "firedRules";

/// A single entry of a [`ResultFactSet`]: either a list of facts (the
/// working-memory dump) or one value (an inserted fact, a counter, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
  Facts(Vec<Fact>),
  Fact(Fact),
}

impl ResultValue {
  pub fn facts(&self) -> &[Fact] {
    match self {
      ResultValue::Facts(facts) => facts,
      ResultValue::Fact(fact) => std::slice::from_ref(fact),
    }
  }
}

/// Output of one decision call, keyed by result identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultFactSet {
  results: BTreeMap<String, ResultValue>,
}

impl ResultFactSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, identifier: impl Into<String>, value: ResultValue) {
    self.results.insert(identifier.into(), value);
  }

  pub fn get(&self, identifier: &str) -> Option<&ResultValue> {
    self.results.get(identifier)
  }

  pub fn identifiers(&self) -> impl Iterator<Item = &str> {
    self.results.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.results.len()
  }

  pub fn is_empty(&self) -> bool {
    self.results.is_empty()
  }

  /// The working-memory facts returned under `resultFactObjects`, or an empty
  /// slice when the session returned none.
  pub fn fact_objects(&self) -> &[Fact] {
    self
      .results
      .get(RESULT_FACT_OBJECTS)
      .map(ResultValue::facts)
      .unwrap_or(&[])
  }

  /// The Response facts among the working-memory facts. All other kinds are
  /// skipped.
  pub fn responses(&self) -> Vec<Response> {
    self
      .fact_objects()
      .iter()
      .filter_map(|fact| match fact {
        Fact::Response(response) => Some(response.clone()),
        Fact::Trigger(_) | Fact::Other(_) => None,
      })
      .collect()
  }
}

impl FromIterator<(String, ResultValue)> for ResultFactSet {
  fn from_iter<I: IntoIterator<Item = (String, ResultValue)>>(iter: I) -> Self {
    Self {
      results: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Trigger;
  use serde_json::json;

  fn mixed_results() -> ResultFactSet {
    serde_json::from_value(json!({
      "firedRules": 3,
      "insertedFactObject_T1": {"type": "Trigger", "triggerId": "T1", "memberId": "M1"},
      "resultFactObjects": [
        {"type": "Response", "value": 1},
        {"type": "Trigger", "triggerId": "T1", "memberId": "M1"},
        {"type": "Reminder", "days": 7},
        {"type": "Response", "value": 2},
        "loose string fact"
      ]
    }))
    .unwrap()
  }

  #[test]
  fn test_deserialize_mixed() {
    let results = mixed_results();
    assert_eq!(results.len(), 3);
    assert_eq!(results.fact_objects().len(), 5);
    assert!(matches!(
      results.get(FIRED_RULES),
      Some(ResultValue::Fact(Fact::Other(_)))
    ));
    assert_eq!(
      results.get("insertedFactObject_T1").map(ResultValue::facts),
      Some(&[Fact::Trigger(Trigger::new("T1", "M1"))][..])
    );
  }

  #[test]
  fn test_responses_filtered() {
    let responses = mixed_results().responses();
    let values: Vec<_> = responses.iter().filter_map(|r| r.get("value")).collect();
    assert_eq!(values.len(), 2);
    assert!(values.contains(&&json!(1)));
    assert!(values.contains(&&json!(2)));
  }

  #[test]
  fn test_missing_fact_objects() {
    let results: ResultFactSet = serde_json::from_value(json!({"firedRules": 0})).unwrap();
    assert!(results.fact_objects().is_empty());
    assert!(results.responses().is_empty());
  }

  #[test]
  fn test_single_fact_object() {
    let results: ResultFactSet =
      serde_json::from_value(json!({"resultFactObjects": {"type": "Response", "value": 9}}))
        .unwrap();
    assert_eq!(results.responses().len(), 1);
  }
}
