//! Feedback cases.
//!
//! `params.cases` lists alternative answers, each with feedback to show when
//! the response matches it:
//!
//! ```json
//! {"answer": "x+1", "feedback": "Check the sign.", "mark": 0, "params": {}}
//! ```
//!
//! Every case is evaluated against the response with the request params
//! overlaid by the case's own params. The first matching case supplies
//! `feedback` and `match`; a `mark` on it overrides `is_correct`.

use serde_json::{json, Map, Value};

use super::guarded;
use crate::capability::{EvaluationFunction, Params};

const MISSING_FIELDS: &str = "Missing answer/feedback field";
const MISSING_IS_CORRECT: &str = "is_correct missing from function output";
const FEEDBACK_SEPARATOR: &str = "<br />";

struct CaseMatch {
    index: usize,
    feedback: Value,
    mark: Option<Value>,
}

/// Result of trying every case.
#[derive(Default)]
pub(super) struct CaseOutcome {
    matched: Option<CaseMatch>,
    warnings: Vec<Value>,
}

impl CaseOutcome {
    /// Merge into the evaluation result object.
    pub(super) fn apply(self, result: &mut Map<String, Value>) {
        let mut warnings = self.warnings;

        if let Some(matched) = self.matched {
            result.insert("feedback".into(), matched.feedback);
            result.insert("match".into(), json!(matched.index));

            if let Some(mark) = matched.mark {
                match mark_as_bool(&mark) {
                    Some(is_correct) => {
                        result.insert("is_correct".into(), Value::Bool(is_correct));
                    }
                    None => warnings.push(json!({
                        "case": matched.index,
                        "message": format!("Case mark {mark} is not an integer"),
                    })),
                }
            }
        }

        if !warnings.is_empty() {
            result.insert("warnings".into(), Value::Array(warnings));
        }
    }
}

/// Evaluate `cases` against `response`.
pub(super) fn resolve(
    function: &dyn EvaluationFunction,
    response: &Value,
    params: &Params,
    cases: &[Value],
) -> CaseOutcome {
    let mut outcome = CaseOutcome::default();
    // (index, feedback produced by the evaluation of that case)
    let mut matches: Vec<(usize, Value)> = Vec::new();

    for (index, case) in cases.iter().enumerate() {
        let (Some(answer), Some(_)) = (case.get("answer"), case.get("feedback")) else {
            outcome
                .warnings
                .push(json!({ "case": index, "message": MISSING_FIELDS }));
            continue;
        };

        let mut merged = params.clone();
        if let Some(Value::Object(overrides)) = case.get("params") {
            merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        match guarded(|| function.evaluate(response, answer, &merged)) {
            // Any truthy `is_correct` counts as a match, not only `true`.
            Ok(result) => match result.get("is_correct").filter(|v| !v.is_null()) {
                Some(is_correct) if is_truthy(is_correct) => matches.push((
                    index,
                    result.get("feedback").cloned().unwrap_or(Value::Null),
                )),
                Some(_) => {}
                None => outcome
                    .warnings
                    .push(json!({ "case": index, "message": MISSING_IS_CORRECT })),
            },
            Err(err) => {
                let (message, detail) = err.to_error_fields();
                let mut warning = Map::new();
                warning.insert("case".into(), json!(index));
                warning.insert("message".into(), Value::String(message));
                if let Some(detail) = detail {
                    warning.insert("detail".into(), detail);
                }
                outcome.warnings.push(Value::Object(warning));
            }
        }
    }

    let Some((first, eval_feedback)) = matches.first().cloned() else {
        return outcome;
    };

    let case = &cases[first];
    let case_feedback = case.get("feedback").cloned().unwrap_or(Value::Null);
    let override_feedback = case
        .get("params")
        .and_then(|p| p.get("override_eval_feedback"))
        .is_some_and(is_truthy);

    let feedback = if override_feedback {
        Value::String(
            [text_of(&case_feedback), text_of(&eval_feedback)].join(FEEDBACK_SEPARATOR),
        )
    } else {
        case_feedback
    };

    outcome.matched = Some(CaseMatch {
        index: first,
        feedback,
        mark: case.get("mark").cloned(),
    });

    if matches.len() > 1 {
        let ids: Vec<String> = matches.iter().map(|(i, _)| i.to_string()).collect();
        outcome.warnings.push(json!({
            "message": format!(
                "Cases {} were matched. Only the first one's feedback was returned",
                ids.join(", ")
            ),
        }));
    }

    outcome
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Marks are integers where any non-zero value means correct.
fn mark_as_bool(mark: &Value) -> Option<bool> {
    match mark {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i != 0)
            .or_else(|| n.as_f64().map(|f| f.trunc() != 0.0)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i != 0),
        _ => None,
    }
}
