//! Birth-weight prediction engine
//!
//! Record normalization, prompt construction, response decoding, risk
//! classification and the sequential batch orchestrator.

mod batch;
mod decoder;
mod normalize;
mod orchestrator;
mod prompt;
mod risk;

pub use batch::{BatchEntry, BatchRun, BatchSummary, RecordOutcome};
pub use decoder::{
    direct_json, embedded_object, numeric_fallback, raw_targeted_object, strip_reasoning,
    DecodeStrategy, ResponseDecoder, ResponseText, MAX_PLAUSIBLE_GRAMS, MIN_PLAUSIBLE_GRAMS,
    NUMERIC_FALLBACK_NOTE,
};
pub use normalize::{normalize, CM_PER_INCH, DAYS_PER_WEEK, KG_PER_POUND};
pub use orchestrator::{
    BatchOrchestrator, OrchestratorConfig, DEFAULT_DEBUG_RESPONSES, DEFAULT_PACING,
};
pub use prompt::{
    user_message, ChatMessage, PredictionRequest, PromptBuilder, Role, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, SYSTEM_INSTRUCTION,
};
pub use risk::{classify, fill_unknown, is_consistent, HIGH_RISK_BELOW_GRAMS, LOW_RISK_ABOVE_GRAMS};
