use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::services::ai_gateway::{self, AiGateway, GatewayError, GatewayRequest, GatewayStage};
use crate::services::json_extract::{self, ParseError};
use crate::services::store::distinct_weakness_types;

/// Most weakness types one request covers.
pub(crate) const MAX_WEAKNESS_TYPES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Difficulty {
    Basic,
    Variation,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PracticeProblem {
    pub(crate) difficulty: Difficulty,
    pub(crate) problem: String,
    #[serde(default)]
    pub(crate) hint: String,
    #[serde(default)]
    pub(crate) answer: String,
    #[serde(default)]
    pub(crate) solution_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProblemSet {
    pub(crate) weakness_type: String,
    pub(crate) problems: Vec<PracticeProblem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    #[serde(default)]
    problem_sets: Vec<ProblemSet>,
}

#[derive(Debug, Error)]
pub(crate) enum SimilarProblemsError {
    #[error("no weakness types to practice")]
    NoWeaknesses,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("model output had no usable problems: {0}")]
    Unusable(String),
}

/// Asks the model for a basic, a variation and an advanced problem per weakness type.
/// Types are trimmed, deduplicated and capped before prompting. Sets the model skipped
/// or left without a problem body are dropped; nothing usable is an error.
pub(crate) async fn generate(
    gateway: &dyn AiGateway,
    student_name: &str,
    weakness_types: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<ProblemSet>, SimilarProblemsError> {
    let requested: Vec<&str> =
        distinct_weakness_types(weakness_types).into_iter().take(MAX_WEAKNESS_TYPES).collect();
    if requested.is_empty() {
        return Err(SimilarProblemsError::NoWeaknesses);
    }

    let prompt = build_prompt(student_name, &requested);
    let text = ai_gateway::call(
        gateway,
        GatewayRequest { stage: GatewayStage::SimilarProblems, prompt: &prompt, images: &[] },
        cancel,
    )
    .await?;

    let reply: Reply = json_extract::extract(&text).map_err(|err: ParseError| {
        tracing::warn!(error = %err, "Similar problem output unusable");
        SimilarProblemsError::Unusable(err.to_string())
    })?;

    let sets = select_sets(reply.problem_sets, &requested);
    if sets.is_empty() {
        return Err(SimilarProblemsError::Unusable("no set matched a requested type".into()));
    }
    tracing::info!(requested = requested.len(), generated = sets.len(), "Similar problems generated");
    Ok(sets)
}

/// Keeps one set per requested type in request order, with at most one problem per
/// difficulty sorted from basic to advanced.
fn select_sets(mut generated: Vec<ProblemSet>, requested: &[&str]) -> Vec<ProblemSet> {
    requested
        .iter()
        .filter_map(|weakness| {
            let index =
                generated.iter().position(|set| set.weakness_type.trim() == *weakness)?;
            let mut set = generated.swap_remove(index);
            set.weakness_type = weakness.to_string();
            set.problems.retain(|problem| !problem.problem.trim().is_empty());
            set.problems.sort_by_key(|problem| problem.difficulty);
            set.problems.dedup_by_key(|problem| problem.difficulty);
            (!set.problems.is_empty()).then_some(set)
        })
        .collect()
}

fn build_prompt(student_name: &str, weakness_types: &[&str]) -> String {
    format!(
        r#"당신은 수학 교육 전문가입니다. 다음 약점 유형을 가진 학생을 위한 맞춤형 유사문제를 생성해주세요.

학생 이름: {student_name}
약점 유형: {types}

각 약점 유형마다 반드시 3가지 난이도의 문제를 만드세요.
- basic: 개념 이해를 위한 기초 문제 (쉬움)
- variation: 유사하지만 약간 변형된 문제 (보통)
- advanced: 개념을 응용한 고난도 문제 (어려움)

각 문제에는 명확한 문제 설명, 힌트, 정답, 단계별 풀이를 포함하세요.
수학 기호는 유니코드로 표현하세요 (예: ², ³, ×, ÷, ≠, ≤, ≥).

**다음 형식의 JSON으로만 응답해주세요:**
{{
  "problemSets": [
    {{
      "weaknessType": "약점 유형명 (위 목록과 동일하게)",
      "problems": [
        {{
          "difficulty": "basic",
          "problem": "문제 내용",
          "hint": "힌트",
          "answer": "정답",
          "solutionSteps": ["풀이 단계 1", "풀이 단계 2"]
        }}
      ]
    }}
  ]
}}"#,
        types = weakness_types.join(", "),
    )
}
