use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_SYSTEM: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            text: text.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ROLE_USER
    }
}

/// One question/answer turn extracted from a logged conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub context: Vec<Message>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub bm25: f64,
    pub vector: f64,
    #[serde(rename = "final")]
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub id: String,
    pub answer: String,
    pub intent: Option<String>,
    pub scores: Scores,
}

impl RetrievalCandidate {
    /// The intent label, treating an empty string as unlabelled.
    pub fn labelled_intent(&self) -> Option<&str> {
        self.intent.as_deref().filter(|intent| !intent.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
    pub citations: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub fallback: bool,
}

impl AnswerPayload {
    /// The canned refusal returned whenever the pipeline declines to answer.
    pub fn refusal(refuse_template: &str) -> Self {
        Self {
            answer: refuse_template.trim().to_string(),
            citations: Vec::new(),
            confidence: 0.0,
            fallback: true,
        }
    }
}
