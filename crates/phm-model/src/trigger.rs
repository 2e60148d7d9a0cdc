use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the synthetic key under which a trigger is inserted into a rule session.
pub const FACT_KEY_PREFIX: &str = "insertedFactObject_";

/// An event identifying a member and the condition that raised it.
///
/// Triggers are immutable once created. The wire form is a flat JSON object
/// (`{"triggerId": .., "memberId": ..}`); the older `originalTriggerId` name is
/// accepted on input and always written back as `triggerId`. Unknown fields
/// are ignored and absent ones decode as empty strings, so a partial message
/// still flows through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trigger {
  #[serde(alias = "originalTriggerId")]
  trigger_id: String,
  member_id: String,
}

impl Trigger {
  pub fn new(trigger_id: impl Into<String>, member_id: impl Into<String>) -> Self {
    Self {
      trigger_id: trigger_id.into(),
      member_id: member_id.into(),
    }
  }

  pub fn trigger_id(&self) -> &str {
    &self.trigger_id
  }

  pub fn member_id(&self) -> &str {
    &self.member_id
  }

  /// Key used for this trigger when it is inserted as a fact.
  pub fn fact_key(&self) -> String {
    format!("{}{}", FACT_KEY_PREFIX, self.trigger_id)
  }
}

impl fmt::Display for Trigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Trigger [memberId={}, triggerId={}]",
      self.member_id, self.trigger_id
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_wire_form() {
    let trigger = Trigger::new("T1", "M1");
    let json = serde_json::to_string(&trigger).unwrap();
    assert_eq!(json, r#"{"triggerId":"T1","memberId":"M1"}"#);
  }

  #[test]
  fn test_round_trip() {
    let triggers = [
      Trigger::new("T1", "M1"),
      Trigger::new("", ""),
      Trigger::new("trg-ünïcode-✓", "member \"quoted\""),
    ];

    for trigger in triggers {
      let bytes = serde_json::to_vec(&trigger).unwrap();
      let back: Trigger = serde_json::from_slice(&bytes).unwrap();
      assert_eq!(back, trigger);
    }
  }

  #[test]
  fn test_original_trigger_id_alias() {
    let trigger: Trigger =
      serde_json::from_str(r#"{"originalTriggerId":"T9","memberId":"M9"}"#).unwrap();
    assert_eq!(trigger.trigger_id(), "T9");
    assert_eq!(
      serde_json::to_string(&trigger).unwrap(),
      r#"{"triggerId":"T9","memberId":"M9"}"#
    );
  }

  #[test]
  fn test_unknown_fields_ignored() {
    let trigger: Trigger =
      serde_json::from_str(r#"{"triggerId":"T1","memberId":"M1","priority":3}"#).unwrap();
    assert_eq!(trigger, Trigger::new("T1", "M1"));
  }

  #[test]
  fn test_missing_fields_default_to_empty() {
    let trigger: Trigger = serde_json::from_str(r#"{"triggerId":"T1"}"#).unwrap();
    assert_eq!(trigger, Trigger::new("T1", ""));
    assert_eq!(trigger.fact_key(), "insertedFactObject_T1");

    let trigger: Trigger = serde_json::from_str(r#"{"memberId":"M1"}"#).unwrap();
    assert_eq!(trigger, Trigger::new("", "M1"));
    assert_eq!(trigger.fact_key(), "insertedFactObject_");

    let empty: Trigger = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, Trigger::default());
  }

  #[test]
  fn test_wrong_field_type_rejected() {
    assert!(serde_json::from_str::<Trigger>(r#"{"triggerId":5,"memberId":"M1"}"#).is_err());
  }

  #[test]
  fn test_fact_key() {
    assert_eq!(Trigger::new("T1", "M1").fact_key(), "insertedFactObject_T1");
  }
}
