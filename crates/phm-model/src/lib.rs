//! Data model for the phm trigger pipeline.
//!
//! Everything that moves between pipeline stages lives here:
//! - [`Trigger`]: the inbound event, also the broker message body
//! - [`Fact`] / [`FactMap`]: what a decision call inserts into a rule session
//! - [`ResultFactSet`]: what a decision call returns
//! - [`ProcessVariables`] / [`ProcessInstanceId`]: process-start input and output
//!
//! Values are owned by whichever stage currently holds them and move between
//! stages by value.

mod fact;
mod process;
mod result;
mod trigger;

pub use fact::{FACT_TYPE_FIELD, Fact, FactMap, Response};
pub use process::{
  ContainerInfo, DATA_LIST_VARIABLE, MEMBER_ID_VARIABLE, ProcessDefinition, ProcessInstanceId,
  ProcessVariables, TRIGGER_ID_VARIABLE,
};
pub use result::{FIRED_RULES, RESULT_FACT_OBJECTS, ResultFactSet, ResultValue};
pub use trigger::{FACT_KEY_PREFIX, Trigger};
