//! Facts exchanged with the decision engine.
//!
//! A [`Fact`] is the typed form of the loosely structured objects a rule
//! session holds. The JSON form carries a `"type"` discriminator
//! (`{"type": "Response", ...}`); anything that is not a recognised kind is
//! kept verbatim as [`Fact::Other`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::trigger::Trigger;

/// Name of the discriminator field in the JSON form of a fact.
pub const FACT_TYPE_FIELD: &str = "type";

const TRIGGER_KIND: &str = "Trigger";
const RESPONSE_KIND: &str = "Response";

/// A single fact held by a rule session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Fact {
  /// An inserted trigger.
  Trigger(Trigger),
  /// A decision outcome consumed by the process-start stage.
  Response(Response),
  /// Any other fact kind (rules, counters, intermediate facts).
  Other(Value),
}

impl Fact {
  /// Kind name as it appears in the `"type"` field.
  pub fn kind(&self) -> &str {
    match self {
      Fact::Trigger(_) => TRIGGER_KIND,
      Fact::Response(_) => RESPONSE_KIND,
      Fact::Other(value) => value
        .get(FACT_TYPE_FIELD)
        .and_then(Value::as_str)
        .unwrap_or("unknown"),
    }
  }

  pub fn as_response(&self) -> Option<&Response> {
    match self {
      Fact::Response(response) => Some(response),
      _ => None,
    }
  }
}

impl From<Trigger> for Fact {
  fn from(trigger: Trigger) -> Self {
    Fact::Trigger(trigger)
  }
}

impl From<Response> for Fact {
  fn from(response: Response) -> Self {
    Fact::Response(response)
  }
}

impl From<Value> for Fact {
  fn from(value: Value) -> Self {
    let Value::Object(mut map) = value else {
      return Fact::Other(value);
    };

    let kind = map
      .get(FACT_TYPE_FIELD)
      .and_then(Value::as_str)
      .map(str::to_owned);

    match kind.as_deref() {
      Some(RESPONSE_KIND) => {
        map.remove(FACT_TYPE_FIELD);
        Fact::Response(Response::new(map))
      }
      // A "Trigger" without the trigger fields is not ours to interpret.
      Some(TRIGGER_KIND) if has_trigger_fields(&map) => {
        let mut fields = map.clone();
        fields.remove(FACT_TYPE_FIELD);
        match serde_json::from_value::<Trigger>(Value::Object(fields)) {
          Ok(trigger) => Fact::Trigger(trigger),
          Err(_) => Fact::Other(Value::Object(map)),
        }
      }
      _ => Fact::Other(Value::Object(map)),
    }
  }
}

fn has_trigger_fields(map: &Map<String, Value>) -> bool {
  map.contains_key("memberId")
    && (map.contains_key("triggerId") || map.contains_key("originalTriggerId"))
}

impl From<Fact> for Value {
  fn from(fact: Fact) -> Self {
    match fact {
      Fact::Trigger(trigger) => {
        let mut map = Map::new();
        map.insert(FACT_TYPE_FIELD.to_string(), Value::from(TRIGGER_KIND));
        map.insert(
          "triggerId".to_string(),
          Value::from(trigger.trigger_id().to_string()),
        );
        map.insert(
          "memberId".to_string(),
          Value::from(trigger.member_id().to_string()),
        );
        Value::Object(map)
      }
      Fact::Response(response) => {
        let mut map = Map::new();
        map.insert(FACT_TYPE_FIELD.to_string(), Value::from(RESPONSE_KIND));
        map.extend(response.fields);
        Value::Object(map)
      }
      Fact::Other(value) => value,
    }
  }
}

/// A decision outcome. Its fields are defined by the rule project, so they
/// are kept as an open JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
  fields: Map<String, Value>,
}

impl Response {
  pub fn new(fields: Map<String, Value>) -> Self {
    Self { fields }
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field)
  }

  pub fn fields(&self) -> &Map<String, Value> {
    &self.fields
  }
}

/// Facts to insert into one rule session call, keyed by their insertion id.
///
/// Built fresh for every decision call and never shared between calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactMap {
  facts: BTreeMap<String, Fact>,
}

impl FactMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fact map holding exactly one trigger under its synthetic key.
  pub fn from_trigger(trigger: Trigger) -> Self {
    let mut map = Self::new();
    map.insert_trigger(trigger);
    map
  }

  /// Insert a trigger under its synthetic key.
  ///
  /// Returns `false` and leaves the map untouched if the key is already taken.
  pub fn insert_trigger(&mut self, trigger: Trigger) -> bool {
    let key = trigger.fact_key();
    if self.facts.contains_key(&key) {
      return false;
    }
    self.facts.insert(key, Fact::Trigger(trigger));
    true
  }

  pub fn get(&self, key: &str) -> Option<&Fact> {
    self.facts.get(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.facts.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Fact)> {
    self.facts.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.facts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.facts.is_empty()
  }
}

impl IntoIterator for FactMap {
  type Item = (String, Fact);
  type IntoIter = std::collections::btree_map::IntoIter<String, Fact>;

  fn into_iter(self) -> Self::IntoIter {
    self.facts.into_iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_response_from_json() {
    let fact: Fact = serde_json::from_value(json!({"type": "Response", "value": 42})).unwrap();
    let response = fact.as_response().expect("should be a response");
    assert_eq!(response.get("value"), Some(&json!(42)));
    assert!(response.get("type").is_none());
  }

  #[test]
  fn test_response_to_json() {
    let mut fields = Map::new();
    fields.insert("value".to_string(), json!(42));
    let value = serde_json::to_value(Fact::Response(Response::new(fields))).unwrap();
    assert_eq!(value, json!({"type": "Response", "value": 42}));
  }

  #[test]
  fn test_trigger_fact() {
    let fact: Fact =
      serde_json::from_value(json!({"type": "Trigger", "triggerId": "T1", "memberId": "M1"}))
        .unwrap();
    assert_eq!(fact, Fact::Trigger(Trigger::new("T1", "M1")));
    assert_eq!(
      serde_json::to_value(&fact).unwrap(),
      json!({"type": "Trigger", "triggerId": "T1", "memberId": "M1"})
    );
  }

  #[test]
  fn test_other_kinds_kept_verbatim() {
    let raw = json!({"type": "Reminder", "days": 7});
    let fact: Fact = serde_json::from_value(raw.clone()).unwrap();
    assert!(matches!(fact, Fact::Other(_)));
    assert_eq!(fact.kind(), "Reminder");
    assert_eq!(serde_json::to_value(&fact).unwrap(), raw);

    let scalar: Fact = serde_json::from_value(json!(3)).unwrap();
    assert_eq!(scalar, Fact::Other(json!(3)));
    assert_eq!(scalar.kind(), "unknown");
  }

  #[test]
  fn test_incomplete_trigger_is_other() {
    let fact: Fact = serde_json::from_value(json!({"type": "Trigger", "memberId": "M1"})).unwrap();
    assert!(matches!(fact, Fact::Other(_)));
  }

  #[test]
  fn test_fact_map_from_trigger() {
    let map = FactMap::from_trigger(Trigger::new("T1", "M1"));
    assert_eq!(map.len(), 1);
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["insertedFactObject_T1"]);
    assert_eq!(
      map.get("insertedFactObject_T1"),
      Some(&Fact::Trigger(Trigger::new("T1", "M1")))
    );
  }

  #[test]
  fn test_fact_map_keys_unique() {
    let mut map = FactMap::new();
    assert!(map.insert_trigger(Trigger::new("T1", "M1")));
    assert!(!map.insert_trigger(Trigger::new("T1", "M2")));
    assert_eq!(map.len(), 1);
    assert_eq!(
      map.get("insertedFactObject_T1"),
      Some(&Fact::Trigger(Trigger::new("T1", "M1")))
    );
  }
}
