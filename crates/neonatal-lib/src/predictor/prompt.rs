//! Prompt construction for the chat-completions endpoint

use crate::models::ClinicalVector;
use serde::{Deserialize, Serialize};

/// Default model identifier
pub const DEFAULT_MODEL: &str = "MiniMax-M2.5";

/// Default output length; reasoning models spend most of it thinking
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Low temperature keeps answers stable across runs
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Fixed system instruction defining the answer schema and risk thresholds
pub const SYSTEM_INSTRUCTION: &str = r#"You are a neonatal risk assessment assistant working in a primary healthcare clinic.

All measurements are metric.

From the maternal and pregnancy data provided, estimate the newborn birth weight in grams and classify neonatal risk.

Answer with ONLY a JSON object of exactly this shape:

{
  "predicted_weight_grams": number,
  "risk_level": "LOW" | "MODERATE" | "HIGH",
  "clinical_note": string
}

Risk classification:
- LOW: predicted weight > 3000 grams
- MODERATE: 2500-3000 grams
- HIGH: < 2500 grams

Rules:
- Apply realistic clinical reasoning
- Do NOT put units inside numbers
- Do NOT write any text outside the JSON object
- Keep clinical_note short and neutral"#;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request payload for one prediction; serializes to the wire body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Builds prediction requests from clinical vectors
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request for one clinical vector
    pub fn build(&self, vector: &ClinicalVector) -> PredictionRequest {
        PredictionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_INSTRUCTION),
                ChatMessage::user(user_message(vector)),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

/// Render the six clinical fields in their fixed order
pub fn user_message(vector: &ClinicalVector) -> String {
    format!(
        "Maternal and pregnancy data for newborn registration:\n\n\
         Gestation: {:.1} weeks\n\
         Parity: {}\n\
         Mother age: {} years\n\
         Mother height: {:.1} cm\n\
         Mother weight: {:.1} kg\n\
         Smoking during pregnancy: {}\n\n\
         Estimate newborn birth weight and risk classification.",
        vector.gestation_weeks,
        vector.parity,
        vector.age_years,
        vector.height_cm,
        vector.weight_kg,
        vector.smoke_token(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector() -> ClinicalVector {
        ClinicalVector {
            gestation_weeks: 40.0,
            parity: 1,
            age_years: 27.0,
            height_cm: 165.1,
            weight_kg: 68.0,
            smoker: false,
        }
    }

    #[test]
    fn test_request_shape() {
        let request = PromptBuilder::new("test-model").build(&vector());

        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(request.messages[1].role, Role::User);
    }

    #[test]
    fn test_user_message_field_order() {
        let message = user_message(&vector());
        let positions: Vec<usize> = [
            "Gestation: 40.0 weeks",
            "Parity: 1",
            "Mother age: 27 years",
            "Mother height: 165.1 cm",
            "Mother weight: 68.0 kg",
            "Smoking during pregnancy: no",
        ]
        .iter()
        .map(|needle| message.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build(&vector()), builder.build(&vector()));
    }

    #[test]
    fn test_system_instruction_schema() {
        for needle in ["predicted_weight_grams", "risk_level", "clinical_note", "> 3000", "< 2500"] {
            assert!(SYSTEM_INSTRUCTION.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_wire_serialization() {
        let request = PromptBuilder::new("m")
            .with_generation(64, 0.5)
            .build(&vector());
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }
}
