//! Prompt text and the logo brief it is usually built from.

use serde::{Deserialize, Serialize};

/// Longest prompt accepted at submission.
pub const MAX_PROMPT_CHARS: usize = 8_000;

/// Input rejected before it reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("prompt exceeds {max} characters")]
    PromptTooLong { max: usize },

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Validated prompt text handed to the image provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if text.chars().count() > MAX_PROMPT_CHARS {
            return Err(ValidationError::PromptTooLong {
                max: MAX_PROMPT_CHARS,
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Business details submitted by a client asking for a logo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoBrief {
    #[serde(rename = "businessname", default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub slogan: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl LogoBrief {
    /// Build the generation prompt, failing if a required field is blank.
    pub fn to_prompt(&self) -> Result<Prompt, ValidationError> {
        let business_name = required(&self.business_name, "businessname")?;
        let industry = required(&self.industry, "industry")?;

        let mut text = format!(
            "I need a colorful traditional logo for my {industry} brand named {business_name}. \
             Use matured and professional colors. Also make sure it is tempting and attractive \
             to the eyes. Play with the brand name and the icon. White background. \
             In {industry} industry logo style. Leverage 60, 30, 10 color principle. \
             Make sure the concept of the logo icon is clear and meaningful. \
             Remember on a white background."
        );

        if let Some(slogan) = self.slogan.as_deref().map(str::trim)
            && !slogan.is_empty()
        {
            text.push_str(" My business slogan is ");
            text.push_str(slogan);
        }

        Prompt::new(text)
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))
}
