use crate::{
    error::MessageError,
    model::{ChartSnapshot, PriceSample},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const PRICE_UPDATE: &str = "price_update";
pub const CHART_DATA_UPDATE: &str = "chart_data_update";

/// Chart resynchronisation payload as seen on the wire.
///
/// Every field is optional when decoding so a consumer can tell "absent" apart from
/// "present but empty".
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<PriceSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_history: Option<Vec<PriceSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_ratio: Option<f64>,
}

impl From<ChartSnapshot> for ChartUpdate {
    fn from(snapshot: ChartSnapshot) -> Self {
        Self {
            current_price: snapshot.current_price,
            recent_history: Some(snapshot.recent_history),
            premium_ratio: Some(snapshot.premium_ratio),
        }
    }
}

/// Real-time message pushed from the server, discriminated by its `type` field.
///
/// Encoded as `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    PriceUpdate(PriceSample),
    ChartDataUpdate(ChartUpdate),
    /// Unrecognised or malformed message, carrying its `type` if one was present.
    #[serde(skip_serializing)]
    Unknown(Option<String>),
}

impl ServerMessage {
    /// Total decoder: never fails, anything unrecognised becomes [`ServerMessage::Unknown`].
    pub fn decode(text: &str) -> Self {
        match Self::try_decode(text) {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, "dropping real-time message");
                let kind = serde_json::from_str::<Value>(text).ok().and_then(|value| {
                    value
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
                ServerMessage::Unknown(kind)
            }
        }
    }

    /// Strict decoder used by [`ServerMessage::decode`].
    pub fn try_decode(text: &str) -> Result<Self, MessageError> {
        let mut value = serde_json::from_str::<Value>(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MessageError::Malformed("missing type discriminator".to_string()))?
            .to_string();
        let data = value
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);

        match kind.as_str() {
            PRICE_UPDATE => Ok(ServerMessage::PriceUpdate(serde_json::from_value(data)?)),
            CHART_DATA_UPDATE => Ok(ServerMessage::ChartDataUpdate(serde_json::from_value(
                data,
            )?)),
            _ => Err(MessageError::UnknownType(kind)),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::PriceUpdate(_) => PRICE_UPDATE,
            ServerMessage::ChartDataUpdate(_) => CHART_DATA_UPDATE,
            ServerMessage::Unknown(kind) => kind.as_deref().unwrap_or("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    fn sample() -> PriceSample {
        PriceSample::new(100.0, 125.0, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_price_update_wire_format() {
        let message = ServerMessage::PriceUpdate(sample());
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "price_update");
        assert_eq!(value["data"]["baseValuation"], 100.0);
        assert_eq!(value["data"]["nativeValuation"], 125.0);
    }

    #[test]
    fn test_chart_data_update_wire_format() {
        let snapshot = ChartSnapshot {
            current_price: Some(sample()),
            recent_history: vec![sample()],
            premium_ratio: 1.25,
        };
        let message = ServerMessage::ChartDataUpdate(ChartUpdate::from(snapshot));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "chart_data_update");
        assert_eq!(value["data"]["premiumRatio"], 1.25);
        assert_eq!(value["data"]["recentHistory"].as_array().unwrap().len(), 1);
        assert_eq!(value["data"]["currentPrice"]["baseValuation"], 100.0);
    }

    #[test]
    fn test_decode_known_messages() {
        let encoded = serde_json::to_string(&ServerMessage::PriceUpdate(sample())).unwrap();
        assert_eq!(ServerMessage::decode(&encoded), ServerMessage::PriceUpdate(sample()));

        let chart = json!({
            "type": "chart_data_update",
            "data": { "recentHistory": [] }
        });
        assert_eq!(
            ServerMessage::decode(&chart.to_string()),
            ServerMessage::ChartDataUpdate(ChartUpdate {
                current_price: None,
                recent_history: Some(vec![]),
                premium_ratio: None,
            })
        );
    }

    #[test]
    fn test_decode_is_total() {
        struct TestCase {
            input: &'static str,
            expected: ServerMessage,
        }

        let tests = vec![
            TestCase {
                // TC0: unknown type
                input: r#"{"type":"welcome","message":"hi"}"#,
                expected: ServerMessage::Unknown(Some("welcome".to_string())),
            },
            TestCase {
                // TC1: not JSON
                input: "not json",
                expected: ServerMessage::Unknown(None),
            },
            TestCase {
                // TC2: missing type
                input: r#"{"data":{}}"#,
                expected: ServerMessage::Unknown(None),
            },
            TestCase {
                // TC3: known type with wrong payload shape
                input: r#"{"type":"price_update","data":{"baseValuation":"x"}}"#,
                expected: ServerMessage::Unknown(Some("price_update".to_string())),
            },
            TestCase {
                // TC4: JSON array
                input: "[1,2,3]",
                expected: ServerMessage::Unknown(None),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = ServerMessage::decode(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_try_decode_reports_unknown_type() {
        let error = ServerMessage::try_decode(r#"{"type":"ping"}"#).unwrap_err();
        assert_eq!(error, MessageError::UnknownType("ping".to_string()));
    }

    #[test]
    fn test_chart_update_absent_fields_are_skipped() {
        let value = serde_json::to_value(ChartUpdate::default()).unwrap();
        assert_eq!(value, json!({}));
    }
}
