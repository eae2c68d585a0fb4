use serde::de::DeserializeOwned;
use serde_json::Value;

use common::models::{AgentLogEntry, Decision, DomainEvent, MacroEvent, Signal, TradeUpdate};

use crate::error::RouteError;

/// Classifies an inbound `{"type": ..., "data": {...}}` envelope.
///
/// Only the shape is checked: required fields must be present, optional ones
/// stay `None` when missing. `manual_signal` is how the backend rebroadcasts a
/// user-submitted signal and is treated like `signal`.
pub fn route(frame: &Value) -> Result<DomainEvent, RouteError> {
    let envelope = frame.as_object().ok_or(RouteError::NotAnObject)?;

    let kind = envelope
        .get("type")
        .and_then(Value::as_str)
        .ok_or(RouteError::MissingDiscriminant)?;

    let build: fn(&Value) -> Result<DomainEvent, serde_json::Error> = match kind {
        "signal" | "manual_signal" => |data| parse::<Signal>(data).map(DomainEvent::Signal),
        "agent_log" => |data| parse::<AgentLogEntry>(data).map(DomainEvent::AgentLog),
        "macro_event" => |data| parse::<MacroEvent>(data).map(DomainEvent::MacroEvent),
        "decision" => |data| parse::<Decision>(data).map(DomainEvent::Decision),
        "trade_update" => |data| parse::<TradeUpdate>(data).map(DomainEvent::TradeUpdate),
        other => return Err(RouteError::Unrecognized(other.to_string())),
    };

    let data = match envelope.get("data") {
        Some(Value::Null) | None => {
            return Err(RouteError::MissingPayload {
                kind: kind.to_string(),
            });
        }
        Some(data) => data,
    };

    build(data).map_err(|source| RouteError::Malformed {
        kind: kind.to_string(),
        source,
    })
}

fn parse<T: DeserializeOwned>(data: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{AgentName, EventId, EventType, ForecastBias, SignalType};
    use serde_json::json;

    #[test]
    fn test_routes_signal() {
        let frame = json!({
            "type": "signal",
            "data": {
                "agent_name": "chartanalyst",
                "symbol": "EURUSD",
                "signal_type": "BUY",
                "confidence": 0.85,
                "reasoning": "Bullish engulfing pattern detected",
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });

        match route(&frame).unwrap() {
            DomainEvent::Signal(signal) => {
                assert_eq!(signal.agent_name, AgentName::ChartAnalyst);
                assert_eq!(signal.signal_type, SignalType::Buy);
                assert_eq!(signal.confidence, Some(0.85));
            }
            other => panic!("expected a signal, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_signal_is_a_signal() {
        let frame = json!({
            "type": "manual_signal",
            "data": {
                "agent_name": "operator",
                "symbol": "XAUUSD",
                "signal_type": "SELL",
                "reasoning": "manual override",
                "timestamp": "2024-01-01T12:00:00.250000"
            }
        });

        let DomainEvent::Signal(signal) = route(&frame).unwrap() else {
            panic!("expected a signal");
        };
        assert_eq!(signal.agent_name, AgentName::Other("operator".to_string()));
        assert_eq!(signal.confidence, None);
    }

    #[test]
    fn test_decision_passes_through_unmodified() {
        let data = json!({
            "symbol": "EURUSD",
            "signal": "BUY",
            "confidence": 0.85,
            "contributing_agents": ["chartanalyst", "riskmanager"],
            "reasoning": "bullish engulfing",
            "timestamp": "2024-01-01T00:00:00Z"
        });
        let frame = json!({ "type": "decision", "data": data.clone() });

        let DomainEvent::Decision(decision) = route(&frame).unwrap() else {
            panic!("expected a decision");
        };
        assert_eq!(serde_json::to_value(&decision).unwrap(), data);
    }

    #[test]
    fn test_decision_without_contributing_agents_is_malformed() {
        let frame = json!({
            "type": "decision",
            "data": {
                "symbol": "EURUSD",
                "signal": "BUY",
                "confidence": 0.85,
                "reasoning": "bullish engulfing",
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });
        assert!(matches!(
            route(&frame),
            Err(RouteError::Malformed { ref kind, .. }) if kind == "decision"
        ));
    }

    #[test]
    fn test_agent_log_without_data_keeps_it_absent() {
        let frame = json!({
            "type": "agent_log",
            "data": {
                "id": "log-17",
                "agent_name": "riskmanager",
                "symbol": "EURUSD",
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });

        let DomainEvent::AgentLog(entry) = route(&frame).unwrap() else {
            panic!("expected an agent log");
        };
        assert_eq!(entry.id, EventId::Text("log-17".to_string()));
        assert_eq!(entry.data, None);
        assert_eq!(entry.confidence, None);
        assert_eq!(entry.reasoning, None);
    }

    #[test]
    fn test_routes_macro_event_and_trade_update() {
        let macro_frame = json!({
            "type": "macro_event",
            "data": {
                "event_name": "FOMC rate decision",
                "event_type": "ECONOMIC",
                "forecast_bias": "BULLISH",
                "impact_score": 9.5,
                "source": "federalreserve.gov",
                "event_time": "2024-01-31T19:00:00Z"
            }
        });
        let DomainEvent::MacroEvent(event) = route(&macro_frame).unwrap() else {
            panic!("expected a macro event");
        };
        assert_eq!(event.event_type, EventType::Economic);
        assert_eq!(event.forecast_bias, ForecastBias::Bullish);

        let trade_frame = json!({
            "type": "trade_update",
            "data": {
                "trade_id": 42,
                "symbol": "EURUSD",
                "entry_time": "2024-01-01T09:00:00Z",
                "entry_price": 1.0950
            }
        });
        assert_eq!(route(&trade_frame).unwrap().kind(), "trade_update");
    }

    #[test]
    fn test_trade_update_requires_trade_id() {
        let frame = json!({
            "type": "trade_update",
            "data": {
                "symbol": "EURUSD",
                "entry_time": "2024-01-01T09:00:00Z",
                "entry_price": 1.0950
            }
        });
        assert!(matches!(
            route(&frame),
            Err(RouteError::Malformed { ref kind, .. }) if kind == "trade_update"
        ));
    }

    #[test]
    fn test_unrecognized_discriminant() {
        let frame = json!({ "type": "order_book", "data": {} });
        assert!(matches!(route(&frame), Err(RouteError::Unrecognized(ref k)) if k == "order_book"));
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(route(&json!([1, 2])), Err(RouteError::NotAnObject)));
        assert!(matches!(
            route(&json!({ "data": {} })),
            Err(RouteError::MissingDiscriminant)
        ));
        assert!(matches!(
            route(&json!({ "type": "signal" })),
            Err(RouteError::MissingPayload { .. })
        ));
        // symbol is required
        let missing_symbol = json!({
            "type": "signal",
            "data": {
                "agent_name": "chartanalyst",
                "signal_type": "BUY",
                "reasoning": "x",
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });
        assert!(matches!(route(&missing_symbol), Err(RouteError::Malformed { .. })));
    }
}
