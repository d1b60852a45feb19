//! Flood risk scoring.
//!
//! [`score_risk`] asks the remote model first and falls back to
//! [`heuristic_risk`] on any failure. The heuristic is a fixed additive score
//! over distance, rainfall, humidity, trend and temperature:
//!
//! | reading      | condition | points |
//! |--------------|-----------|--------|
//! | distance cm  | <= 20     | +3     |
//! |              | <= 50     | +2     |
//! |              | <= 80     | +1     |
//! | rainfall mm  | >= 30     | +3     |
//! |              | >= 15     | +2     |
//! |              | >= 5      | +1     |
//! | humidity %   | >= 90     | +1     |
//! | trend        | rising    | +2     |
//! |              | falling   | -1     |
//! | temp °C      | <= 2      | +1     |
//!
//! A total of 6 or more is High, 3 or more is Medium, anything else Low.

use serde::Deserialize;

use crate::inference::{TextGenerationClient, remote_or_fallback, strip_code_fence};
use crate::logging::Component;
use crate::model::{
    Composed, InferenceError, RiskInput, RiskLevel, RiskResult, Trend, ValidationError,
};

pub const HIGH_SCORE: i32 = 6;
pub const MEDIUM_SCORE: i32 = 3;

/// Explanation used when no clause triggers.
pub const SAFE_RANGES_CLAUSE: &str = "readings within safe ranges";

// ---------------------------------------------------------------------------
// Local heuristic
// ---------------------------------------------------------------------------

/// Additive score for `input`; may be negative.
pub fn heuristic_score(input: &RiskInput) -> i32 {
    let mut score = 0;

    score += if input.distance_cm <= 20.0 {
        3
    } else if input.distance_cm <= 50.0 {
        2
    } else if input.distance_cm <= 80.0 {
        1
    } else {
        0
    };

    score += if input.rainfall_mm >= 30.0 {
        3
    } else if input.rainfall_mm >= 15.0 {
        2
    } else if input.rainfall_mm >= 5.0 {
        1
    } else {
        0
    };

    if input.humidity >= 90.0 {
        score += 1;
    }

    score += match input.trend {
        Trend::Rising => 2,
        Trend::Falling => -1,
        Trend::Stable | Trend::Other(_) => 0,
    };

    if input.temp <= 2.0 {
        score += 1;
    }

    score
}

pub fn level_for_score(score: i32) -> RiskLevel {
    if score >= HIGH_SCORE {
        RiskLevel::High
    } else if score >= MEDIUM_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Human-readable reasons, in fixed order, for the conditions that hold.
pub fn explanation_clauses(input: &RiskInput) -> Vec<&'static str> {
    let mut clauses = Vec::new();
    if input.distance_cm <= 50.0 {
        clauses.push("water level close to sensor");
    }
    if input.rainfall_mm >= 15.0 {
        clauses.push("heavy/recent rainfall");
    }
    if input.trend == Trend::Rising {
        clauses.push("rising trend detected");
    }
    if input.humidity >= 90.0 {
        clauses.push("humidity high");
    }
    if clauses.is_empty() {
        clauses.push(SAFE_RANGES_CLAUSE);
    }
    clauses
}

/// Deterministic local scoring. Never fails.
pub fn heuristic_risk(input: &RiskInput, prediction_id: &str) -> RiskResult {
    let level = level_for_score(heuristic_score(input));
    let explanation = format!("{} risk — {}.", level, explanation_clauses(input).join("; "));
    RiskResult {
        risk_level: level,
        explanation,
        prediction_id: prediction_id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Remote strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RemoteRiskReply {
    #[serde(rename = "riskLevel")]
    risk_level: String,
    explanation: String,
}

pub fn risk_prompt(input: &RiskInput) -> String {
    format!(
        "You are a flood risk assistant for a riverside water-level sensor.\n\
         Classify the current flood risk from these readings:\n\
         - distance_cm (gap between sensor and water surface): {}\n\
         - rainfall_mm (last hour): {}\n\
         - humidity (%): {}\n\
         - temp (°C): {}\n\
         - trend: {}\n\n\
         Answer with a minimal JSON object and nothing else, exactly of the form\n\
         {{\"riskLevel\": \"Low\" | \"Medium\" | \"High\", \"explanation\": \"<one short sentence>\"}}",
        input.distance_cm, input.rainfall_mm, input.humidity, input.temp, input.trend
    )
}

/// Parses a model reply into a [`RiskResult`].
///
/// The reply may be wrapped in a code fence. `riskLevel` must be exactly one
/// of `Low`, `Medium`, `High`; anything else is a schema error.
pub fn parse_remote_risk(text: &str, prediction_id: &str) -> Result<RiskResult, InferenceError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    let reply: RemoteRiskReply = serde_json::from_str(body)?;

    let level = RiskLevel::parse_exact(&reply.risk_level).ok_or_else(|| {
        InferenceError::Schema(format!("unrecognized riskLevel {:?}", reply.risk_level))
    })?;

    let explanation = reply.explanation.trim();
    if explanation.is_empty() {
        return Err(InferenceError::Schema("empty explanation".to_string()));
    }

    Ok(RiskResult {
        risk_level: level,
        explanation: explanation.to_string(),
        prediction_id: prediction_id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Scores `input`, remote first with the heuristic as fallback.
pub fn score_risk<C>(
    client: &C,
    input: &RiskInput,
    prediction_id: &str,
    temperature: f32,
) -> Composed<RiskResult>
where
    C: TextGenerationClient + ?Sized,
{
    remote_or_fallback(
        client,
        Component::Scorer,
        &risk_prompt(input),
        temperature,
        |text| parse_remote_risk(text, prediction_id),
        || heuristic_risk(input, prediction_id),
    )
}

/// Boundary entry point: rejects malformed input before scoring.
pub fn score_risk_checked<C>(
    client: &C,
    input: &RiskInput,
    prediction_id: &str,
    temperature: f32,
) -> Result<Composed<RiskResult>, ValidationError>
where
    C: TextGenerationClient + ?Sized,
{
    input.validate()?;
    Ok(score_risk(client, input, prediction_id, temperature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provenance;

    fn input(distance: f64, rain: f64, humidity: f64, temp: f64, trend: Trend) -> RiskInput {
        RiskInput {
            distance_cm: distance,
            rainfall_mm: rain,
            humidity,
            temp,
            trend,
        }
    }

    /// Neutral readings that contribute nothing, for isolating one factor.
    fn neutral() -> RiskInput {
        input(200.0, 0.0, 50.0, 20.0, Trend::Stable)
    }

    struct Reply(Result<String, InferenceError>);

    impl TextGenerationClient for Reply {
        fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, InferenceError> {
            self.0.clone()
        }
    }

    // --- Heuristic scoring --------------------------------------------------

    #[test]
    fn test_distance_boundaries() {
        let at = |d| heuristic_score(&RiskInput { distance_cm: d, ..neutral() });
        assert_eq!(at(20.0), 3);
        assert_eq!(at(20.1), 2);
        assert_eq!(at(50.0), 2, "distance 50 contributes +2, not +1");
        assert_eq!(at(80.0), 1);
        assert_eq!(at(81.0), 0);
    }

    #[test]
    fn test_rainfall_boundaries() {
        let at = |r| heuristic_score(&RiskInput { rainfall_mm: r, ..neutral() });
        assert_eq!(at(4.9), 0);
        assert_eq!(at(5.0), 1);
        assert_eq!(at(15.0), 2);
        assert_eq!(at(30.0), 3);
    }

    #[test]
    fn test_humidity_trend_and_temperature_points() {
        assert_eq!(heuristic_score(&RiskInput { humidity: 90.0, ..neutral() }), 1);
        assert_eq!(heuristic_score(&RiskInput { trend: Trend::Rising, ..neutral() }), 2);
        assert_eq!(heuristic_score(&RiskInput { trend: Trend::Falling, ..neutral() }), -1);
        assert_eq!(
            heuristic_score(&RiskInput { trend: Trend::from("surging"), ..neutral() }),
            0,
            "unrecognized trend strings contribute nothing"
        );
        assert_eq!(heuristic_score(&RiskInput { temp: 2.0, ..neutral() }), 1);
        assert_eq!(heuristic_score(&RiskInput { temp: 2.1, ..neutral() }), 0);
    }

    #[test]
    fn test_level_cutoffs() {
        assert_eq!(level_for_score(-1), RiskLevel::Low);
        assert_eq!(level_for_score(2), RiskLevel::Low);
        assert_eq!(level_for_score(3), RiskLevel::Medium);
        assert_eq!(level_for_score(5), RiskLevel::Medium);
        assert_eq!(level_for_score(6), RiskLevel::High);
    }

    #[test]
    fn test_scenario_all_factors_high() {
        let i = input(15.0, 35.0, 95.0, 1.0, Trend::Rising);
        assert_eq!(heuristic_score(&i), 10);

        let r = heuristic_risk(&i, "pred-a");
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(
            r.explanation,
            "High risk — water level close to sensor; heavy/recent rainfall; \
             rising trend detected; humidity high."
        );
        assert_eq!(r.prediction_id, "pred-a");
    }

    #[test]
    fn test_scenario_calm_and_falling() {
        let i = input(90.0, 0.0, 40.0, 20.0, Trend::Falling);
        assert_eq!(heuristic_score(&i), -1);

        let r = heuristic_risk(&i, "pred-b");
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert_eq!(r.explanation, "Low risk — readings within safe ranges.");
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let i = input(45.0, 16.0, 70.0, 8.0, Trend::Stable);
        assert_eq!(heuristic_risk(&i, "k"), heuristic_risk(&i, "k"));
    }

    // --- Remote parsing -----------------------------------------------------

    #[test]
    fn test_parse_plain_and_fenced_replies() {
        let plain = parse_remote_risk(
            r#"{"riskLevel":"Medium","explanation":"Water is rising slowly."}"#,
            "p1",
        )
        .unwrap();
        assert_eq!(plain.risk_level, RiskLevel::Medium);
        assert_eq!(plain.explanation, "Water is rising slowly.");

        let fenced = parse_remote_risk(
            "```json\n{\"riskLevel\": \"High\", \"explanation\": \"Sensor nearly submerged.\"}\n```",
            "p2",
        )
        .unwrap();
        assert_eq!(fenced.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_unrecognized_level_is_rejected() {
        let err = parse_remote_risk(r#"{"riskLevel":"Severe","explanation":"x"}"#, "p").unwrap_err();
        assert!(matches!(err, InferenceError::Schema(_)), "got {:?}", err);

        let err = parse_remote_risk(r#"{"riskLevel":"high","explanation":"x"}"#, "p").unwrap_err();
        assert!(
            matches!(err, InferenceError::Schema(_)),
            "level match is case-sensitive, got {:?}",
            err
        );
    }

    #[test]
    fn test_unparseable_reply_is_rejected() {
        assert!(matches!(
            parse_remote_risk("High risk, evacuate.", "p"),
            Err(InferenceError::Parse(_))
        ));
        assert!(matches!(
            parse_remote_risk(r#"{"riskLevel":"Low"}"#, "p"),
            Err(InferenceError::Parse(_))
        ));
        assert_eq!(parse_remote_risk("``````", "p"), Err(InferenceError::EmptyResponse));
    }

    // --- Combined strategy --------------------------------------------------

    #[test]
    fn test_remote_answer_is_used_when_valid() {
        let client = Reply(Ok(r#"{"riskLevel":"Low","explanation":"All calm."}"#.into()));
        let out = score_risk(&client, &input(15.0, 35.0, 95.0, 1.0, Trend::Rising), "p", 0.2);
        assert_eq!(out.provenance, Provenance::Remote);
        assert_eq!(out.output.risk_level, RiskLevel::Low);
        assert_eq!(out.output.explanation, "All calm.");
    }

    #[test]
    fn test_severe_reply_falls_back_to_heuristic() {
        let client = Reply(Ok(r#"{"riskLevel":"Severe","explanation":"Run."}"#.into()));
        let i = input(15.0, 35.0, 95.0, 1.0, Trend::Rising);
        let out = score_risk(&client, &i, "p", 0.2);
        assert_eq!(out.provenance, Provenance::Fallback);
        assert_eq!(out.output, heuristic_risk(&i, "p"));
        assert!(out.advisory.is_some());
    }

    #[test]
    fn test_http_failure_falls_back_to_heuristic() {
        let client = Reply(Err(InferenceError::HttpStatus(500)));
        let out = score_risk(&client, &neutral(), "p", 0.2);
        assert_eq!(out.provenance, Provenance::Fallback);
        assert_eq!(out.output.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_checked_entry_rejects_non_finite_input() {
        let client = Reply(Err(InferenceError::EmptyResponse));
        let bad = RiskInput { rainfall_mm: f64::NAN, ..neutral() };
        assert_eq!(
            score_risk_checked(&client, &bad, "p", 0.2),
            Err(ValidationError::NonFinite { field: "rainfall_mm" })
        );
    }
}
