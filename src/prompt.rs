//! Prompt assembly for the three AI features
//!
//! The gateway interpolates caller-supplied context into fixed message
//! templates and forwards them upstream. The templates are deliberately
//! plain: prompt content is presentation, the plumbing around it is what
//! this crate specifies.

use crate::chat::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// How far along a student already is in the chosen career path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    CompleteBeginner,
    Beginner,
    Intermediate,
    Advanced,
}

impl ExpertiseLevel {
    /// Student-facing description used inside the roadmap prompt.
    fn description(self) -> &'static str {
        match self {
            Self::CompleteBeginner => "has no experience in this field and is starting from scratch",
            Self::Beginner => "knows the basics but hasn't built anything significant yet",
            Self::Intermediate => "has some projects and fundamental knowledge in this area",
            Self::Advanced => "is already proficient and looking to specialize further",
        }
    }
}

/// Career-path context assembled by the caller (the database is external;
/// the gateway never queries it).
#[derive(Debug, Clone, Serialize, Deserialize, bon::Builder)]
pub struct RoadmapContext {
    /// Defaulted when absent so the handler can answer 400 instead of the
    /// extractor rejecting the request outright.
    #[builder(into)]
    #[serde(default)]
    pub career_path_name: String,
    #[builder(into)]
    pub career_description: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub expertise_level: ExpertiseLevel,
    /// Free-form student profile notes (semester, work style, progress).
    #[builder(into)]
    pub student_profile: Option<String>,
}

/// Where the student is in their studies; steers the advice framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemesterBucket {
    Early,
    #[default]
    Mid,
    Final,
}

impl SemesterBucket {
    fn label(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Mid => "mid",
            Self::Final => "final",
        }
    }

    fn framing_guidance(self) -> &'static str {
        match self {
            Self::Early => {
                "Frame recommendations with exploration and reassurance; these are \
                 suggestions to try, not commitments."
            }
            Self::Mid => {
                "Frame recommendations with a skill-building focus; help the student \
                 narrow their domain."
            }
            Self::Final => {
                "Frame recommendations with job-readiness; focus on how these build \
                 portfolio-worthy skills."
            }
        }
    }
}

/// One catalog elective, assembled by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectiveEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills_gained: Vec<String>,
    #[serde(default)]
    pub relevance_score: Option<u32>,
    #[serde(default)]
    pub recommended_semester: Option<u32>,
}

/// An alumni quote relevant to the target career path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlumniInsight {
    pub name: String,
    pub job_title: String,
    pub quote: String,
}

/// Caller-assembled context for an electives recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, bon::Builder)]
pub struct ElectivesContext {
    #[builder(into)]
    #[serde(default)]
    pub career_goal: String,
    #[builder(into)]
    pub career_description: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub target_semester: Option<u32>,
    #[builder(default)]
    #[serde(default)]
    pub semester_bucket: SemesterBucket,
    /// Electives the student is already considering, by name.
    #[builder(default)]
    #[serde(default)]
    pub considered: Vec<String>,
    #[builder(default)]
    #[serde(default)]
    pub catalog: Vec<ElectiveEntry>,
    #[builder(default)]
    #[serde(default)]
    pub alumni_insights: Vec<AlumniInsight>,
    #[builder(default)]
    #[serde(default)]
    pub skills_learned: Vec<String>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn message(role: &str, content: impl Into<String>) -> Value {
    json!({"role": role, "content": content.into()})
}

/// Messages for the roadmap-generation stream.
pub fn roadmap_messages(ctx: &RoadmapContext) -> Vec<Value> {
    let system = "You are a career guidance expert helping students navigate their educational \
                  and professional journeys. Provide actionable, semester-by-semester roadmaps \
                  tailored to the student's expertise level. Be encouraging but realistic, and \
                  use markdown for structure.";

    let mut user = format!(
        "Create a personalized career roadmap for a student pursuing: {}\n",
        ctx.career_path_name
    );
    if let Some(description) = &ctx.career_description {
        user.push_str(&format!("Career description: {description}\n"));
    }
    if !ctx.required_skills.is_empty() {
        user.push_str(&format!(
            "Required skills: {}\n",
            ctx.required_skills.join(", ")
        ));
    }
    user.push_str(&format!(
        "The student {}.\n",
        ctx.expertise_level.description()
    ));
    if let Some(profile) = &ctx.student_profile {
        user.push_str(&format!("Student profile: {profile}\n"));
    }
    user.push_str(
        "Cover: current position assessment, skills gap analysis, a semester-by-semester \
         roadmap, recommended electives, portfolio project ideas, and next steps.",
    );

    vec![message("system", system), message("user", user)]
}

/// Messages for a follow-up chat about an already-generated roadmap.
pub fn roadmap_chat_messages(
    roadmap_content: &str,
    career_path_name: &str,
    history: &[ChatMessage],
) -> Vec<Value> {
    let system = format!(
        "You are a career guidance expert answering follow-up questions about a roadmap you \
         created for the {career_path_name} path. Keep answers specific to this roadmap:\n\n\
         {roadmap_content}"
    );
    let mut messages = vec![message("system", system)];
    messages.extend(
        history
            .iter()
            .map(|m| message(role_name(m.role), m.content.clone())),
    );
    messages
}

/// Messages for the electives recommendation call (single-shot, not
/// streamed; the caller expects one structured JSON answer).
pub fn electives_messages(ctx: &ElectivesContext) -> Vec<Value> {
    let mut retrieved = String::from("## TARGET CAREER PATH:\n");
    retrieved.push_str(&ctx.career_goal);
    if let Some(description) = &ctx.career_description {
        retrieved.push_str(&format!(": {description}"));
    }
    retrieved.push('\n');
    if !ctx.required_skills.is_empty() {
        retrieved.push_str(&format!(
            "Required skills: {}\n",
            ctx.required_skills.join(", ")
        ));
    }

    retrieved.push_str("\n## AVAILABLE ELECTIVES:\n");
    for elective in &ctx.catalog {
        retrieved.push_str(&format!(
            "- {} \"{}\": {}",
            elective.code, elective.name, elective.description
        ));
        if !elective.skills_gained.is_empty() {
            retrieved.push_str(&format!(" Skills: {}.", elective.skills_gained.join(", ")));
        }
        if let Some(score) = elective.relevance_score {
            retrieved.push_str(&format!(" Relevance score: {score}."));
        }
        if let Some(semester) = elective.recommended_semester {
            retrieved.push_str(&format!(" Recommended semester: {semester}."));
        }
        retrieved.push('\n');
    }

    if !ctx.considered.is_empty() {
        retrieved.push_str("\n## ELECTIVES UNDER CONSIDERATION:\n");
        for name in &ctx.considered {
            retrieved.push_str(&format!("- {name}\n"));
        }
    }

    if !ctx.alumni_insights.is_empty() {
        retrieved.push_str("\n## ALUMNI INSIGHTS:\n");
        for insight in &ctx.alumni_insights {
            retrieved.push_str(&format!(
                "- {} ({}): \"{}\"\n",
                insight.name, insight.job_title, insight.quote
            ));
        }
    }

    let target_semester = ctx
        .target_semester
        .map(|n| n.to_string())
        .unwrap_or_else(|| "not specified".to_string());
    let mut user_context = format!(
        "- Target semester: {target_semester}\n- Semester bucket: {}\n- Career goal: {}\n",
        ctx.semester_bucket.label(),
        ctx.career_goal
    );
    if !ctx.skills_learned.is_empty() {
        user_context.push_str(&format!(
            "- Skills already learned: {}\n",
            ctx.skills_learned.join(", ")
        ));
    }

    let system = format!(
        "You are an electives advisor for university students. Recommend the best \
         electives for the student's career goal and existing progress.\n\n\
         ## USER CONTEXT:\n{user_context}\n\
         ## FRAMING GUIDANCE:\n{}\n\n\
         ## RETRIEVED DATA:\n{retrieved}\n\
         ## REQUIRED OUTPUT FORMAT (JSON):\n\
         Return ONLY valid JSON in this exact format:\n\
         {{\"recommendations\": [{{\"rank\": 1, \"elective_name\": \"...\", \
         \"elective_code\": \"...\", \"relevance_score\": 95, \
         \"skills_gained\": [\"...\"], \"reasoning\": \"...\", \
         \"is_best_recommended\": true}}], \
         \"comparison_summary\": \"...\", \"alumni_insight\": \"...\"}}\n\
         Return at most three electives and mark exactly one as is_best_recommended.",
        ctx.semester_bucket.framing_guidance()
    );

    let considering = if ctx.considered.is_empty() {
        "any available electives".to_string()
    } else {
        ctx.considered.join(", ")
    };
    let user = format!("Please recommend the best electives for me. I'm considering: {considering}.");

    vec![message("system", system), message("user", user)]
}

/// Messages for the general AI assistant conversation.
pub fn assistant_messages(history: &[ChatMessage]) -> Vec<Value> {
    let system = "You are a friendly academic and career assistant for university students. \
                  Answer concisely and practically.";
    let mut messages = vec![message("system", system)];
    messages.extend(
        history
            .iter()
            .map(|m| message(role_name(m.role), m.content.clone())),
    );
    messages
}
