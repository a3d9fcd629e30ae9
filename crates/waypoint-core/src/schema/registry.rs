//! Per-stage output contracts.

use std::collections::HashSet;

use serde_json::Value;

use super::{Field, FieldPath, Shape, Violation, check};
use crate::artifact::QuestionType;
use crate::stage::Stage;

/// Holds the output [`Shape`] of every stage.
///
/// The registry is immutable once built and is shared behind an `Arc` by
/// every parser; it needs no locking.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    intake_form: Shape,
    project_outline: Shape,
    task_schedule: Shape,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchemaRegistry {
    /// The contracts the built-in prompts ask for.
    pub fn standard() -> Self {
        Self {
            intake_form: intake_form_shape(),
            project_outline: project_outline_shape(),
            task_schedule: task_schedule_shape(),
        }
    }

    pub fn shape(&self, stage: Stage) -> &Shape {
        match stage {
            Stage::IntakeForm => &self.intake_form,
            Stage::ProjectOutline => &self.project_outline,
            Stage::TaskSchedule => &self.task_schedule,
        }
    }

    /// Check a decoded payload against the stage contract.
    ///
    /// Structural violations come first, followed by the cross-field rules.
    /// The rules read fields leniently, so they also run on a payload that
    /// is structurally broken and every problem is reported at once.
    pub fn check(&self, stage: Stage, value: &Value) -> Vec<Violation> {
        let mut violations = check(self.shape(stage), value);
        if stage == Stage::IntakeForm {
            violations.extend(question_rules(value));
        }
        violations
    }

    /// The stage contract as a JSON-Schema-style document.
    pub fn json_schema(&self, stage: Stage) -> Value {
        let mut schema = self.shape(stage).to_json_schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("title".to_string(), Value::from(stage.as_str()));
        }
        schema
    }
}

fn intake_form_shape() -> Shape {
    let question = Shape::object([
        Field::required("id", Shape::text()).describe("Stable snake_case identifier"),
        Field::required("prompt", Shape::text()),
        Field::required("questionType", Shape::Enum(&QuestionType::VARIANTS)),
        Field::optional("options", Shape::array(Shape::String { min_len: 0 }))
            .describe("Empty for free_text questions"),
        Field::optional("position", Shape::Integer { min: 0 })
            .describe("Zero-based display order"),
    ]);
    Shape::object([Field::required("questions", Shape::array(question))])
}

fn project_outline_shape() -> Shape {
    let milestone = Shape::object([
        Field::required("title", Shape::text()).describe("Action-oriented milestone title"),
        Field::required("description", Shape::text()).describe("One or two sentences"),
        Field::optional("successCriteria", Shape::array(Shape::String { min_len: 0 })),
        Field::optional("estimatedDurationDays", Shape::positive_number()),
    ]);
    Shape::object([Field::required("milestones", Shape::array(milestone))])
}

fn task_schedule_shape() -> Shape {
    let task = Shape::object([
        Field::optional("day", Shape::Integer { min: 1 }).describe("One-based day number"),
        Field::required("title", Shape::text()).describe("Three to eight words"),
        Field::required("objective", Shape::text()),
        Field::required("body", Shape::text()).describe("Step-by-step guidance"),
        Field::required("estimatedMinutes", Shape::positive_number()),
        Field::optional("description", Shape::text()),
        Field::optional("optionalChallenge", Shape::text()),
        Field::optional("reflectionPrompt", Shape::text()),
    ]);
    Shape::object([Field::required("tasks", Shape::array(task))])
}

/// Question ids must be unique within a form.
fn question_rules(value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(questions) = value.get("questions").and_then(Value::as_array) else {
        return violations;
    };
    let base = FieldPath::root().key("questions");
    let mut seen = HashSet::new();

    for (i, question) in questions.iter().enumerate() {
        let path = base.index(i);
        if let Some(id) = question.get("id").and_then(Value::as_str) {
            if !seen.insert(id.trim()) {
                violations.push(Violation::new(
                    &path.key("id"),
                    format!("duplicate question id {:?}", id.trim()),
                ));
            }
        }
    }
    violations
}
