use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::db::models::ProblemAnalysis;
use crate::db::types::GradingOutcome;
use crate::services::ai_gateway::{self, AiGateway, GatewayError, GatewayRequest, GatewayStage, InlineImage};
use crate::services::json_extract::{self, ParseError};
use crate::services::subject_detection::SubjectInfo;

pub(crate) const QUESTIONS_PER_IMAGE: i64 = 5;
const PARSE_FALLBACK_RATIO: f64 = 0.75;
const GATEWAY_FALLBACK_RATIO: f64 = 0.80;
const DEFAULT_COMPLETION: &str = "good";

/// Grading fields as produced by the model or a fallback, before score reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradingDraft {
    pub(crate) outcome: GradingOutcome,
    pub(crate) stated_score: Option<f64>,
    pub(crate) total_questions: Option<i64>,
    pub(crate) correct_answers: Option<i64>,
    pub(crate) feedback: String,
    pub(crate) strengths: String,
    pub(crate) suggestions: String,
    pub(crate) completion: String,
    pub(crate) problem_analysis: Vec<ProblemAnalysis>,
    pub(crate) weakness_types: Vec<String>,
    pub(crate) detailed_analysis: String,
    pub(crate) study_direction: String,
}

pub(crate) async fn grade(
    gateway: &dyn AiGateway,
    subject: &SubjectInfo,
    images: &[InlineImage],
    cancel: &CancellationToken,
) -> Result<GradingDraft, GatewayError> {
    let prompt = build_prompt(subject, images.len());
    let request = GatewayRequest { stage: GatewayStage::Grading, prompt: &prompt, images };

    let draft = match ai_gateway::call(gateway, request, cancel).await {
        Ok(text) => draft_from_text(&text, images.len()),
        Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
        Err(err) => {
            tracing::warn!(error = %err, "Grading call failed, using gateway fallback");
            gateway_fallback(images.len())
        }
    };

    tracing::info!(
        outcome = draft.outcome.as_str(),
        problems = draft.problem_analysis.len(),
        weaknesses = draft.weakness_types.len(),
        "Detailed grading finished"
    );
    Ok(draft)
}

fn draft_from_text(text: &str, image_count: usize) -> GradingDraft {
    match json_extract::extract_value(text) {
        Ok(Value::Object(map)) => draft_from_object(&map),
        Ok(_) => gateway_fallback(image_count),
        Err(ParseError::NoObject) => {
            tracing::warn!(chars = text.chars().count(), "Grading output had no JSON object");
            parse_fallback(image_count)
        }
        Err(ParseError::Invalid(err)) => {
            tracing::warn!(error = %err, "Grading JSON could not be decoded");
            gateway_fallback(image_count)
        }
    }
}

fn draft_from_object(map: &Map<String, Value>) -> GradingDraft {
    GradingDraft {
        outcome: GradingOutcome::AiGraded,
        stated_score: number_field(map, "score"),
        total_questions: integer_field(map, "totalQuestions"),
        correct_answers: integer_field(map, "correctAnswers"),
        feedback: text_field(map, "feedback"),
        strengths: text_field(map, "strengths"),
        suggestions: text_field(map, "suggestions"),
        completion: Some(text_field(map, "completion"))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPLETION.to_string()),
        problem_analysis: problem_list(map.get("problemAnalysis")),
        weakness_types: normalize_weakness_types(map.get("weaknessTypes")),
        detailed_analysis: text_field(map, "detailedAnalysis"),
        study_direction: text_field(map, "studyDirection"),
    }
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match map.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('점').trim().parse().ok(),
        _ => None,
    };
    value.filter(|value| value.is_finite())
}

fn integer_field(map: &Map<String, Value>, key: &str) -> Option<i64> {
    number_field(map, key).map(|value| value.floor() as i64)
}

/// Strings pass through; lists of strings are joined with spaces.
fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// Entries that are not objects are dropped; missing fields default.
fn problem_list(value: Option<&Value>) -> Vec<ProblemAnalysis> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value::<ProblemAnalysis>(item.clone()).ok())
        .collect()
}

/// Trimmed, non-empty, first occurrence wins.
pub(crate) fn normalize_weakness_types(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let mut types: Vec<String> = Vec::with_capacity(items.len());
    for item in items.iter().filter_map(Value::as_str) {
        let item = item.trim();
        if !item.is_empty() && !types.iter().any(|existing| existing == item) {
            types.push(item.to_string());
        }
    }
    types
}

fn fallback_counts(image_count: usize, ratio: f64) -> (i64, i64) {
    let total = image_count as i64 * QUESTIONS_PER_IMAGE;
    (total, (total as f64 * ratio).floor() as i64)
}

/// The call succeeded but returned prose without any JSON object.
pub(crate) fn parse_fallback(image_count: usize) -> GradingDraft {
    let (total, correct) = fallback_counts(image_count, PARSE_FALLBACK_RATIO);
    GradingDraft {
        outcome: GradingOutcome::ParseFallback,
        stated_score: Some(75.0),
        total_questions: Some(total),
        correct_answers: Some(correct),
        feedback: format!(
            "총 {image_count}장의 숙제를 제출했습니다. 전반적으로 성실하게 완성했고 문제 풀이에 \
             노력한 흔적이 보입니다. 일부 문제에서 실수가 있었지만 꾸준히 학습하면 좋아질 것입니다."
        ),
        strengths: "숙제를 끝까지 완료했습니다. 글씨를 또박또박 써서 읽기 쉬웠습니다. 어려운 문제도 \
                    포기하지 않고 풀려고 노력했습니다."
            .to_string(),
        suggestions: "문제를 풀기 전에 천천히 다시 읽어보세요. 계산 과정을 정리해서 적으면 실수를 \
                      줄일 수 있습니다. 어려운 개념은 교과서로 다시 복습해보세요."
            .to_string(),
        completion: DEFAULT_COMPLETION.to_string(),
        problem_analysis: Vec::new(),
        weakness_types: Vec::new(),
        detailed_analysis: format!(
            "제출된 {image_count}장의 숙제를 검토했습니다. 기본 개념은 이해하고 있으나 일부 응용 \
             문제에서 어려움을 보였습니다. 풀이 과정을 생략한 문제가 있어 아쉬웠습니다. 풀이를 더 \
             자세히 적으면 복습할 때 도움이 됩니다."
        ),
        study_direction: "이번 숙제에서 어려웠던 부분을 중심으로 복습해보세요. 틀린 문제는 왜 \
                          틀렸는지 스스로 정리하고 비슷한 유형을 추가로 풀어보세요. 다음 목표는 \
                          85점입니다."
            .to_string(),
    }
}

/// The call failed, or the JSON it returned could not be decoded.
pub(crate) fn gateway_fallback(image_count: usize) -> GradingDraft {
    let (total, correct) = fallback_counts(image_count, GATEWAY_FALLBACK_RATIO);
    GradingDraft {
        outcome: GradingOutcome::GatewayFallback,
        stated_score: Some(80.0),
        total_questions: Some(total),
        correct_answers: Some(correct),
        feedback: format!(
            "총 {image_count}장의 숙제를 성실히 제출했습니다. 문제를 끝까지 풀려고 노력했고 기본 \
             개념을 잘 이해하고 있습니다. 풀이 과정도 논리적으로 전개했습니다."
        ),
        strengths: "꾸준히 숙제를 완료하는 성실함이 돋보입니다. 기본 개념을 잘 이해하고 있습니다. \
                    풀이 과정을 논리적으로 전개했습니다."
            .to_string(),
        suggestions: "복습 시간을 조금 더 가져보세요. 틀린 문제는 다시 풀어보며 원인을 찾아보세요. \
                      매일 조금씩 연습하면 실력이 향상됩니다."
            .to_string(),
        completion: DEFAULT_COMPLETION.to_string(),
        problem_analysis: Vec::new(),
        weakness_types: Vec::new(),
        detailed_analysis: format!(
            "제출된 {image_count}장의 숙제를 검토했습니다. 대부분의 문제를 정확하게 풀었고 학습 \
             태도가 좋습니다. 일부 심화 문제는 추가 연습으로 충분히 보완할 수 있습니다."
        ),
        study_direction: "현재 수준을 잘 유지하고 있습니다. 기본 개념이 확실하니 심화 문제에도 \
                          도전해보세요. 다음 목표는 90점입니다."
            .to_string(),
    }
}

pub(crate) fn build_prompt(subject: &SubjectInfo, image_count: usize) -> String {
    let subject_name = &subject.subject;
    let grade = subject.grade;
    let concepts = subject.concepts.join(", ");

    format!(
        r#"당신은 {subject_name} 전문 선생님입니다. 학생의 학년은 {grade}학년이며 관련 개념은 {concepts}입니다.
다음 {image_count}장의 숙제 사진을 순서대로 분석하여 모든 문제를 찾아 상세하게 채점해주세요.

**점수 계산 방식**
- 전체 문제 수(totalQuestions)와 맞춘 문제 수(correctAnswers)를 정확히 세어주세요
- 점수 = correctAnswers / totalQuestions × 100 (소수점 첫째자리)
- 예: 20문제 중 18문제 정답 → 90.0점

**채점 기준 (총 100점)**
1. 문제 풀이의 정확성 (40점): 최종 답, 계산 과정, 수식 적용, 단위
2. 풀이 과정의 논리성 (30점): 논리적 전개, 중간 단계, 효율성
3. 글씨와 정리 정돈 (20점): 가독성, 수식 정렬, 수정 흔적
4. 완성도 (10점): 빈칸이나 미완성 문제가 없는지

**작성 지침**
- problemAnalysis: 발견한 모든 문제를 page, problem, answer, isCorrect, type, concept, explanation으로 기록
- type은 덧셈, 뺄셈, 곱셈, 나눗셈, 분수, 도형, 문장제, 맞춤법, 문법, 독해처럼 구체적인 유형으로 분류
- weaknessTypes: 틀린 문제에서 반복되는 유형 목록
- feedback: 학습 태도, 강한 개념, 약한 개념을 모두 포함 (7문장 이상)
- strengths, suggestions: 각각 구체적인 항목 3가지 이상
- detailedAnalysis: 문제별 개념과 오답 원인을 포함한 상세 분석 (15문장 이상)
- studyDirection: 다음 주에 실천할 학습 계획 (5문장 이상)
- completion: "excellent", "good", "fair", "poor" 중 하나

**다음 형식의 JSON 하나로만 응답해주세요:**
```json
{{
  "subject": "{subject_name}",
  "grade": {grade},
  "score": 90.0,
  "totalQuestions": 20,
  "correctAnswers": 18,
  "feedback": "숙제를 성실하게 완성했습니다. 곱셈 개념을 정확히 이해하고 있습니다. 나눗셈의 나머지 처리는 보완이 필요합니다.",
  "strengths": "곱셈 문제를 모두 정확히 풀었습니다. 풀이 과정을 단계별로 적었습니다. 글씨가 또박또박합니다.",
  "suggestions": "나눗셈의 나머지 처리를 복습해보세요. 문장제는 구하는 것을 먼저 찾으세요. 세로 계산 시 자릿수를 맞춰 쓰세요.",
  "completion": "good",
  "problemAnalysis": [
    {{
      "page": 1,
      "problem": "18 ÷ 5",
      "answer": "3",
      "isCorrect": false,
      "type": "나눗셈",
      "concept": "나눗셈 나머지",
      "explanation": "나머지를 고려하지 않았습니다. 정답은 '3 나머지 3'입니다."
    }}
  ],
  "weaknessTypes": ["나눗셈"],
  "detailedAnalysis": "총 20문제 중 18문제를 맞혔습니다. ...",
  "studyDirection": "이번 주에는 나눗셈의 나머지 개념에 집중하세요. ..."
}}
```"#
    )
}
