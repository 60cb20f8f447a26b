//! Prompt rendering for test generation
//!
//! Prompts are rendered through handlebars with escaping disabled, so the
//! submitted code lands in the prompt byte for byte.

mod language;

pub use language::detect_language;

use crate::error::Result;
use crate::registry::{CodeLanguage, TestFramework};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};

const PROMPT_TEMPLATE: &str = "test_prompt";

const PROMPT_SOURCE: &str = "🎯 Goal:
{{task}}

📦 Response Format:
{{format}}

⚠️ Warnings:
{{warnings}}

📝 Additional Context:
{{context}}

Code to test:
```
{{code}}
```";

const FALLBACK_FORMAT: &str =
    "Return structured and readable output. Use code blocks where appropriate.";
const FALLBACK_WARNINGS: &str = "Ensure accuracy. Avoid assumptions or hallucinations.";
const FALLBACK_CONTEXT: &str = "No extra context provided.";

/// The four free-text sections of a rendered prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStructure {
    pub task: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub context: String,
}

impl PromptStructure {
    /// Best-practice guidance for generating tests with `framework`
    pub fn defaults_for(framework: TestFramework) -> Self {
        Self {
            task: format!(
                "Generate a comprehensive unit test for the following code using {}.",
                framework
            ),
            format: format!(
                "1. Test Suite Structure:
   - Use describe blocks for grouping related tests
   - Use clear, descriptive test names
   - Follow AAA pattern (Arrange, Act, Assert)

2. Test Cases:
   - Include happy path scenarios
   - Include edge cases
   - Include error scenarios
   - Use appropriate assertions

3. Code Style:
   - Use proper indentation
   - Add comments only where the logic is not self-explanatory
   - Follow clean code rules
   - Follow best practices for {}",
                framework
            ),
            warnings: "- Ensure all test cases are meaningful and test actual functionality
- Avoid testing implementation details
- Make sure mocks and stubs are properly set up
- Verify all assertions are valid and necessary"
                .to_string(),
            context: "- The test should be production-ready
- Consider performance implications
- Follow the project's testing conventions
- Ensure good test coverage"
                .to_string(),
        }
    }

    /// Fill blank sections of `self` from `defaults`
    fn merged_with(&self, defaults: PromptStructure) -> PromptStructure {
        fn pick(value: &str, default: String) -> String {
            if value.trim().is_empty() {
                default
            } else {
                value.trim().to_string()
            }
        }

        PromptStructure {
            task: pick(&self.task, defaults.task),
            format: pick(&self.format, defaults.format),
            warnings: pick(&self.warnings, defaults.warnings),
            context: pick(&self.context, defaults.context),
        }
    }
}

#[derive(Serialize)]
struct PromptData<'a> {
    task: &'a str,
    format: &'a str,
    warnings: &'a str,
    context: &'a str,
    code: &'a str,
}

/// Renders test generation prompts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template_string(PROMPT_TEMPLATE, PROMPT_SOURCE)?;
        Ok(Self { registry })
    }

    /// Render the prompt for `code`; sections missing from `structure` use the
    /// framework defaults
    pub fn build_prompt(
        &self,
        code: &str,
        framework: TestFramework,
        structure: Option<&PromptStructure>,
    ) -> Result<String> {
        let sections = match structure {
            Some(custom) => custom.merged_with(PromptStructure::defaults_for(framework)),
            None => PromptStructure::defaults_for(framework),
        };

        self.render(&sections, code)
    }

    /// Render arbitrary sections, falling back to generic wording for blanks
    pub fn render(&self, sections: &PromptStructure, code: &str) -> Result<String> {
        let format = non_blank(&sections.format, FALLBACK_FORMAT);
        let warnings = non_blank(&sections.warnings, FALLBACK_WARNINGS);
        let context = non_blank(&sections.context, FALLBACK_CONTEXT);

        let data = PromptData {
            task: sections.task.trim(),
            format,
            warnings,
            context,
            code,
        };

        Ok(self.registry.render(PROMPT_TEMPLATE, &data)?)
    }

    /// The instruction sent as the system message to every vendor
    pub fn system_prompt(&self, framework: TestFramework, language: CodeLanguage) -> String {
        format!(
            "You are an expert at writing unit tests. Generate a comprehensive unit test \
             for the provided {} code using {}. Include test cases for edge cases and error \
             scenarios. Respond with the test code only.",
            language.display_name(),
            framework
        )
    }
}

fn non_blank<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
