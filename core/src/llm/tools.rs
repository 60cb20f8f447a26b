//! Tool declarations offered to tool-capable vendors

use crate::error::Result;
use crate::llm::client::{FunctionDefinition, ToolDefinition};
use crate::prompt::PromptStructure;
use crate::registry::TestFramework;
use serde_json::{json, Value};

pub const STRUCTURE_PROMPT: &str = "structurePrompt";
pub const ANALYZE_CODE: &str = "analyzeCode";
pub const EXPLAIN_TEST_GENERATION: &str = "explainTestGeneration";

const STRUCTURE_PROMPT_DESCRIPTION: &str =
    "Structure the prompt for test generation with clear goals, format, warnings, and context";
const ANALYZE_CODE_DESCRIPTION: &str =
    "Analyze the code to identify key components that need testing";

fn function_tool(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

fn structure_prompt_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": "The main goal of the test generation"
            },
            "format": {
                "type": "string",
                "description": "The expected format of the test output"
            },
            "warnings": {
                "type": "string",
                "description": "Important considerations and constraints"
            },
            "context": {
                "type": "string",
                "description": "Additional context for test generation"
            }
        },
        "required": ["task"]
    })
}

fn analyze_code_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "code": {
                "type": "string",
                "description": "The code to analyze"
            },
            "testFramework": {
                "type": "string",
                "description": "The testing framework to use"
            }
        },
        "required": ["code", "testFramework"]
    })
}

/// Tools declared to OpenAI-compatible chat completions
pub fn test_generation_tools() -> Vec<ToolDefinition> {
    vec![
        function_tool(
            STRUCTURE_PROMPT,
            STRUCTURE_PROMPT_DESCRIPTION,
            structure_prompt_schema(),
        ),
        function_tool(ANALYZE_CODE, ANALYZE_CODE_DESCRIPTION, analyze_code_schema()),
    ]
}

/// Tools declared to the Anthropic messages API
///
/// Same schemas as [`test_generation_tools`] with longer descriptions, plus
/// `explainTestGeneration`.
pub fn anthropic_tools() -> Vec<ToolDefinition> {
    vec![
        function_tool(
            STRUCTURE_PROMPT,
            &format!(
                "{}. This tool helps organize the test generation process by defining the task, expected format, important warnings, and additional context.",
                STRUCTURE_PROMPT_DESCRIPTION
            ),
            structure_prompt_schema(),
        ),
        function_tool(
            ANALYZE_CODE,
            &format!(
                "{}. This tool examines the code structure, identifies functions, classes, and their dependencies to determine what needs to be tested.",
                ANALYZE_CODE_DESCRIPTION
            ),
            analyze_code_schema(),
        ),
        function_tool(
            EXPLAIN_TEST_GENERATION,
            "Explain the test generation process, including what was tested, why certain test cases were chosen, and any important considerations. This tool provides a summary of the testing approach and rationale.",
            json!({
                "type": "object",
                "properties": {
                    "testCode": {
                        "type": "string",
                        "description": "The generated test code"
                    },
                    "originalCode": {
                        "type": "string",
                        "description": "The original code that was tested"
                    },
                    "testFramework": {
                        "type": "string",
                        "description": "The testing framework used"
                    },
                    "explanation": {
                        "type": "string",
                        "description": "Explanation of the test generation process and rationale"
                    }
                },
                "required": ["testCode", "originalCode", "testFramework", "explanation"]
            }),
        ),
    ]
}

/// The payload returned for every tool invocation
pub fn tool_result_payload(framework: TestFramework) -> Result<String> {
    Ok(serde_json::to_string(&PromptStructure::defaults_for(
        framework,
    ))?)
}
