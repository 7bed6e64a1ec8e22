//! Prompts for the assessment and planning calls

use crate::ai::PromptBuilder;

const ROLE_EXPERTISE: &str = "biostatistics assistant";
const ROLE_TASK: &str = "preparing clinical research data for statistical analysis";

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Stage 0: suggest relevant columns and ask clarifying questions
pub fn assessment_prompt(query: &str, columns: &[String], missing_summary: &str) -> String {
    PromptBuilder::new()
        .role(ROLE_EXPERTISE, ROLE_TASK)
        .section(
            "Task",
            "Read the user's request and the dataset description, suggest the columns that \
             are relevant to the request, and ask clarifying questions where the request is ambiguous.",
        )
        .context_item("Available columns", &json_list(columns))
        .context_item("Missing values", missing_summary)
        .context_item("User request", &format!("\"{}\"", query))
        .objectives(vec![
            "Identify the key concepts in the request that must be measured or compared (for example age, treatment type, complications).",
            "Pick the available columns that most likely correspond to those concepts. Consider synonyms and abbreviated names ('sex' for gender, 'comp_dindo' for complications). Prefer columns with fewer missing values.",
            "If the request is unclear, several columns fit one concept, or you are unsure, write short and precise clarifying questions for the user.",
            "Answer with a JSON object with exactly two keys: \"suggested_columns\" (list of strings, only names from the available columns) and \"questions_to_user\" (list of strings, [] when there are no questions).",
        ])
        .section("Example response", "")
        .code(
            "json",
            r#"{
  "suggested_columns": ["Age", "Study_group", "Complications_ClavienDindo"],
  "questions_to_user": ["By 'treatment efficacy', do you mean the column 'Therapy_response'?", "Which column should group the 'surgery type': 'Surgery_code' or 'Surgery_text'?"]
}"#,
        )
        .custom("IMPORTANT: Return ONLY the JSON object, no markdown (```json), no text before or after it.")
        .build()
}

/// Stage 1: turn confirmed columns into a step-by-step plan
pub fn plan_prompt(query: &str, confirmed_columns: &[String], clarification: Option<&str>) -> String {
    let mut builder = PromptBuilder::new()
        .role(ROLE_EXPERTISE, ROLE_TASK)
        .section("Task", "Write a detailed statistical analysis plan for the user's request.")
        .context_item("User request", &format!("\"{}\"", query))
        .context_item("Confirmed columns", &json_list(confirmed_columns));

    if let Some(text) = clarification.map(str::trim).filter(|t| !t.is_empty()) {
        builder = builder.context_item("Answers to clarifying questions", &format!("\"{}\"", text));
    }

    builder
        .objectives(vec![
            "Using ONLY the confirmed columns, map them to the parts of the request.",
            "For every part of the request that the confirmed columns can answer, choose a concrete statistical test and its variables.",
            "Supported tests: 't-test' (compare numeric 'variable' between 2 groups of 'grouping_variable'), 'chi-square' (association between categorical 'variable1' and 'variable2'), 'descriptive_stats' (descriptive statistics for 'variable').",
            "If part of the request CANNOT be answered with the confirmed columns, add a step with \"analysis_type\": \"error\" and a clear explanation in \"message\".",
            "Answer with a JSON list ([...]) of objects, one per step. Every object has an 'analysis_type' key plus the keys its type needs ('variable', 'grouping_variable', 'variable1', 'variable2', 'message').",
        ])
        .focus(
            "the confirmed columns",
            vec!["Never reference a column that is not in the confirmed list"],
        )
        .section("Example response", "")
        .code(
            "json",
            r#"[
  {"analysis_type": "t-test", "variable": "Age", "grouping_variable": "Study_group"},
  {"analysis_type": "chi-square", "variable1": "Complications_ClavienDindo", "variable2": "Study_group"},
  {"analysis_type": "error", "message": "No confirmed column measures 'survival'."}
]"#,
        )
        .custom("IMPORTANT: Return ONLY the JSON list, no markdown (```json), no text before or after it.")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_prompt_contents() {
        let prompt = assessment_prompt(
            "compare age between groups",
            &["Age".to_string(), "Group".to_string()],
            "Column 'Age' has 20.0% missing.",
        );
        assert!(prompt.contains(r#"["Age","Group"]"#));
        assert!(prompt.contains("Column 'Age' has 20.0% missing."));
        assert!(prompt.contains("\"compare age between groups\""));
        assert!(prompt.contains("suggested_columns"));
        assert!(prompt.contains("Return ONLY the JSON object"));
    }

    #[test]
    fn test_plan_prompt_clarification_is_optional() {
        let columns = vec!["Age".to_string()];
        let without = plan_prompt("q", &columns, Some("   "));
        assert!(!without.contains("Answers to clarifying questions"));

        let with = plan_prompt("q", &columns, Some("use Age in years"));
        assert!(with.contains("Answers to clarifying questions"));
        assert!(with.contains("use Age in years"));
        assert!(with.contains("Return ONLY the JSON list"));
    }
}
