//! Module outline generation request and result types.
//!
//! A [`GenerateModuleOutline`] is what the user fills in; the service
//! answers with a [`ModuleOutline`], which the user may edit and submit
//! again to generate the full [`Module`](crate::module::Module).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validation::{
    coerce_number, drop_blank, parse_leading_int, require_non_blank, serialize_as_string,
    serialize_number,
};

/// Parameters for generating a module outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateModuleOutline {
    pub title: String,
    pub about: String,
    /// Total module duration, kept as a decimal string on the wire.
    pub minutes: String,
    pub learner_persona: String,
    pub learning_objectives: Vec<String>,
    pub tools: Vec<String>,
}

impl GenerateModuleOutline {
    /// Normalise user input before submission.
    ///
    /// Blank objectives and tools are dropped, and `minutes` is reduced
    /// to its leading integer (`"0"` when there is none).
    pub fn cleaned(&self) -> Self {
        Self {
            title: self.title.clone(),
            about: self.about.clone(),
            minutes: parse_leading_int(&self.minutes).to_string(),
            learner_persona: self.learner_persona.clone(),
            learning_objectives: drop_blank(&self.learning_objectives),
            tools: drop_blank(&self.tools),
        }
    }

    /// Check required fields. Expects a [`cleaned`](Self::cleaned) payload.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_non_blank("title", &self.title)?;
        require_non_blank("about", &self.about)?;
        require_non_blank("learnerPersona", &self.learner_persona)?;

        let minutes = parse_leading_int(&self.minutes);
        if minutes < 1 {
            return Err(CoreError::Validation(format!(
                "minutes must be at least 1, got {minutes}"
            )));
        }
        Ok(())
    }
}

/// One microlesson within a generated outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineMicrolesson {
    pub title: String,
    #[serde(deserialize_with = "coerce_number", serialize_with = "serialize_number")]
    pub id: f64,
    /// Rendered as a string when the outline is sent back for module generation.
    #[serde(deserialize_with = "coerce_number", serialize_with = "serialize_as_string")]
    pub minutes: f64,
    pub learning_objective: String,
    pub outline: Vec<String>,
}

/// A generated module outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOutline {
    pub title: String,
    pub about: String,
    pub tools: Vec<String>,
    pub learner_persona: String,
    pub prerequisites: Vec<String>,
    pub microlessons: Vec<OutlineMicrolesson>,
}

impl ModuleOutline {
    /// Normalise an edited outline before submitting it for module
    /// generation: blank tools, prerequisites and outline steps are dropped.
    pub fn cleaned(&self) -> Self {
        Self {
            title: self.title.clone(),
            about: self.about.clone(),
            tools: drop_blank(&self.tools),
            learner_persona: self.learner_persona.clone(),
            prerequisites: drop_blank(&self.prerequisites),
            microlessons: self
                .microlessons
                .iter()
                .map(|lesson| OutlineMicrolesson {
                    outline: drop_blank(&lesson.outline),
                    ..lesson.clone()
                })
                .collect(),
        }
    }

    /// Check required fields. Expects a [`cleaned`](Self::cleaned) payload.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_non_blank("title", &self.title)?;
        require_non_blank("about", &self.about)?;
        require_non_blank("learnerPersona", &self.learner_persona)?;
        if self.microlessons.is_empty() {
            return Err(CoreError::Validation(
                "outline must contain at least one microlesson".into(),
            ));
        }
        for lesson in &self.microlessons {
            require_non_blank("microlessons.title", &lesson.title)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::validation::{PayloadValidator, SchemaValidator};

    fn request() -> GenerateModuleOutline {
        GenerateModuleOutline {
            title: "Intro to Javascript Arrays".into(),
            about: "Arrays, the fundamental list datatype.".into(),
            minutes: "90 ".into(),
            learner_persona: "A beginner JavaScript developer.".into(),
            learning_objectives: vec!["Define arrays.".into(), " ".into()],
            tools: vec!["".into(), "Visual Studio Code".into()],
        }
    }

    #[test]
    fn cleaned_request_drops_blanks_and_normalises_minutes() {
        let cleaned = request().cleaned();
        assert_eq!(cleaned.minutes, "90");
        assert_eq!(cleaned.learning_objectives, vec!["Define arrays."]);
        assert_eq!(cleaned.tools, vec!["Visual Studio Code"]);
    }

    #[test]
    fn unparsable_minutes_become_zero_and_fail_validation() {
        let mut req = request();
        req.minutes = "soon".into();
        let cleaned = req.cleaned();
        assert_eq!(cleaned.minutes, "0");
        assert_matches!(cleaned.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_title_fails_validation() {
        let mut req = request();
        req.title = "  ".into();
        assert_matches!(req.cleaned().validate(), Err(CoreError::MissingField("title")));
    }

    #[test]
    fn request_serializes_camel_case() {
        let json = serde_json::to_value(request().cleaned()).unwrap();
        assert_eq!(json["learnerPersona"], "A beginner JavaScript developer.");
        assert_eq!(json["learningObjectives"][0], "Define arrays.");
        assert_eq!(json["minutes"], "90");
    }

    #[test]
    fn outline_validates_with_coerced_numbers() {
        let payload = serde_json::json!({
            "title": "Arrays",
            "about": "About arrays",
            "tools": ["VS Code"],
            "learnerPersona": "Beginner",
            "prerequisites": [],
            "microlessons": [{
                "title": "Creating arrays",
                "id": "1",
                "minutes": "15",
                "learningObjective": "Create arrays",
                "outline": ["Literal syntax", ""]
            }]
        });

        let outline = SchemaValidator::<ModuleOutline>::new()
            .validate(payload)
            .unwrap();
        assert_eq!(outline.microlessons[0].id, 1.0);
        assert_eq!(outline.microlessons[0].minutes, 15.0);

        let cleaned = outline.cleaned();
        assert_eq!(cleaned.microlessons[0].outline, vec!["Literal syntax"]);
        assert!(cleaned.validate().is_ok());

        let wire = serde_json::to_value(&cleaned).unwrap();
        assert_eq!(wire["microlessons"][0]["minutes"], "15");
        assert_eq!(wire["microlessons"][0]["id"], 1);
    }

    #[test]
    fn outline_without_microlessons_fails_validation() {
        let outline = ModuleOutline {
            title: "Arrays".into(),
            about: "About".into(),
            tools: vec![],
            learner_persona: "Beginner".into(),
            prerequisites: vec![],
            microlessons: vec![],
        };
        assert_matches!(outline.validate(), Err(CoreError::Validation(_)));
    }
}
