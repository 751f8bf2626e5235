use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::services::ai_gateway::{self, AiGateway, GatewayError, GatewayRequest, GatewayStage, InlineImage};
use crate::services::json_extract;

pub(crate) const DEFAULT_SUBJECT: &str = "수학";
pub(crate) const DEFAULT_GRADE: i32 = 3;
pub(crate) const DEFAULT_CONCEPT: &str = "기본 연산";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubjectInfo {
    pub(crate) subject: String,
    pub(crate) grade: i32,
    pub(crate) concepts: Vec<String>,
    /// False when the defaults were substituted.
    pub(crate) detected: bool,
}

impl Default for SubjectInfo {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            grade: DEFAULT_GRADE,
            concepts: vec![DEFAULT_CONCEPT.to_string()],
            detected: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionPayload {
    subject: Option<String>,
    #[serde(default)]
    grade: Value,
    #[serde(default)]
    concepts: Vec<Value>,
}

pub(crate) fn build_prompt(image_count: usize) -> String {
    format!(
        r#"다음 {image_count}장의 숙제 사진을 분석하여 과목과 학년을 판별해주세요.

다음 JSON 형식으로 응답해주세요:
{{
  "subject": "수학" 또는 "영어" 또는 "국어" 등,
  "grade": 초등학교 학년 (1~6) 또는 중학교 학년 (7~9),
  "concepts": ["덧셈", "뺄셈", "곱셈"] 등 관련 개념 목록
}}"#
    )
}

/// Classifies the submission. Any failure other than cancellation yields the defaults.
pub(crate) async fn detect(
    gateway: &dyn AiGateway,
    images: &[InlineImage],
    cancel: &CancellationToken,
) -> Result<SubjectInfo, GatewayError> {
    let prompt = build_prompt(images.len());
    let request = GatewayRequest { stage: GatewayStage::SubjectDetection, prompt: &prompt, images };

    let text = match ai_gateway::call(gateway, request, cancel).await {
        Ok(text) => text,
        Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
        Err(err) => {
            tracing::warn!(error = %err, "Subject detection failed, using defaults");
            return Ok(SubjectInfo::default());
        }
    };

    Ok(parse_detection(&text).unwrap_or_else(|| {
        tracing::info!("Subject detection output unusable, using defaults");
        SubjectInfo::default()
    }))
}

fn parse_detection(text: &str) -> Option<SubjectInfo> {
    let payload: DetectionPayload = json_extract::extract(text).ok()?;
    let defaults = SubjectInfo::default();

    let subject = payload
        .subject
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or(defaults.subject);
    let grade = grade_value(&payload.grade).unwrap_or(defaults.grade);
    let concepts: Vec<String> = payload
        .concepts
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();

    tracing::info!(subject = %subject, grade, "Detected subject");
    Some(SubjectInfo {
        subject,
        grade,
        concepts: if concepts.is_empty() { defaults.concepts } else { concepts },
        detected: true,
    })
}

/// Accepts `4`, `4.0` or `"4"` / `"4학년"`; anything outside 1..=12 is rejected.
fn grade_value(value: &Value) -> Option<i32> {
    let grade = match value {
        Value::Number(number) => number.as_f64().map(|grade| grade.round() as i64),
        Value::String(text) => {
            let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }?;
    (1..=12).contains(&grade).then_some(grade as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGateway;

    #[test]
    fn prompt_mentions_image_count() {
        assert!(build_prompt(4).starts_with("다음 4장의 숙제 사진"));
    }

    #[test]
    fn parses_detection_with_surrounding_text() {
        let info =
            parse_detection("결과: {\"subject\": \"영어\", \"grade\": 5, \"concepts\": [\"문법\"]}")
                .unwrap();
        assert_eq!(info.subject, "영어");
        assert_eq!(info.grade, 5);
        assert_eq!(info.concepts, vec!["문법".to_string()]);
        assert!(info.detected);
    }

    #[test]
    fn string_grade_is_accepted() {
        let info = parse_detection(r#"{"subject": "국어", "grade": "4학년"}"#).unwrap();
        assert_eq!(info.grade, 4);
        assert_eq!(info.concepts, vec![DEFAULT_CONCEPT.to_string()]);
    }

    #[test]
    fn out_of_range_grade_falls_back() {
        let info = parse_detection(r#"{"subject": "수학", "grade": 40}"#).unwrap();
        assert_eq!(info.grade, DEFAULT_GRADE);
    }

    #[tokio::test]
    async fn gateway_failure_yields_defaults() {
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Transport("reset".into()))]);
        let info = detect(&gateway, &[], &CancellationToken::new()).await.unwrap();
        assert_eq!(info, SubjectInfo::default());
    }

    #[tokio::test]
    async fn prose_without_json_yields_defaults() {
        let gateway = ScriptedGateway::new(vec![Ok("수학 숙제로 보입니다".into())]);
        let info = detect(&gateway, &[], &CancellationToken::new()).await.unwrap();
        assert!(!info.detected);
        assert_eq!(info.subject, DEFAULT_SUBJECT);
    }

    #[tokio::test]
    async fn cancellation_is_propagated() {
        let gateway = ScriptedGateway::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(detect(&gateway, &[], &cancel).await, Err(GatewayError::Cancelled));
    }
}
