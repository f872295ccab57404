//! Full generated module returned by the `module` task type and the
//! crew endpoint.

use serde::{Deserialize, Serialize};

use crate::validation::{coerce_number, serialize_number};

/// One microlesson of a generated module, including the learning
/// experience designer (LED) and subject matter expert (SME) responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microlesson {
    pub title: String,
    #[serde(deserialize_with = "coerce_number", serialize_with = "serialize_number")]
    pub id: f64,
    #[serde(deserialize_with = "coerce_number", serialize_with = "serialize_number")]
    pub minutes: f64,
    pub learning_objective: String,
    pub outline: Vec<String>,
    pub led_response: String,
    pub sme_response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub title: String,
    pub about: String,
    pub learner_persona: String,
    pub prerequisites: Vec<String>,
    pub tools: Vec<String>,
    pub microlessons: Vec<Microlesson>,
}
