use std::collections::BTreeMap;

use arb_types::{Leg, Opportunity, OpportunityKind, PipelineTimestamps};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("malformed field {field}: {detail}")]
    MalformedField { field: &'static str, detail: String }
}

/// Turns an [`Opportunity`] into the flat field map the stream transport
/// carries natively ("serializes into a field map").
pub fn encode_opportunity(opp: &Opportunity) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), hex::encode(opp.id));
    fields.insert("kind".to_string(), opp.kind.to_string());
    fields.insert("chain_id".to_string(), opp.chain_id.to_string());
    fields.insert("legs".to_string(), serde_json::to_string(&opp.legs).unwrap_or_default());
    fields.insert("gross_bps".to_string(), opp.gross_bps.to_string());
    fields.insert("net_bps".to_string(), opp.net_bps.to_string());
    fields.insert("confidence".to_string(), opp.confidence.to_string());
    fields.insert("expiry_millis".to_string(), opp.expiry_millis.to_string());
    fields.insert("ws_received".to_string(), opp.pipeline.ws_received.to_string());
    fields.insert("published".to_string(), opp.pipeline.published.to_string());
    fields.insert("source".to_string(), opp.source.clone());
    fields
}

pub fn decode_opportunity(fields: &BTreeMap<String, String>) -> Result<Opportunity, CodecError> {
    fn get<'a>(fields: &'a BTreeMap<String, String>, key: &'static str) -> Result<&'a str, CodecError> {
        fields.get(key).map(String::as_str).ok_or(CodecError::MissingField(key))
    }
    fn parse<T: std::str::FromStr>(fields: &BTreeMap<String, String>, key: &'static str) -> Result<T, CodecError> {
        get(fields, key)?.parse::<T>().map_err(|e| CodecError::MalformedField { field: key, detail: e.to_string() })
    }

    let id_bytes = hex::decode(get(fields, "id")?)
        .map_err(|e| CodecError::MalformedField { field: "id", detail: e.to_string() })?;
    let id: [u8; 32] =
        id_bytes.try_into().map_err(|_| CodecError::MalformedField { field: "id", detail: "wrong length".to_string() })?;

    let kind = match get(fields, "kind")? {
        "two_pair" => OpportunityKind::TwoPair,
        "triangular" => OpportunityKind::Triangular,
        "multi_leg" => OpportunityKind::MultiLeg,
        "cross_chain" => OpportunityKind::CrossChain,
        other => return Err(CodecError::MalformedField { field: "kind", detail: other.to_string() })
    };

    let legs: Vec<Leg> = serde_json::from_str(get(fields, "legs")?)
        .map_err(|e| CodecError::MalformedField { field: "legs", detail: e.to_string() })?;

    let pipeline = PipelineTimestamps {
        ws_received: parse(fields, "ws_received")?,
        published: parse(fields, "published")?,
        coordinator_seen: None,
        execution_received: None
    };

    Opportunity::new(
        id,
        kind,
        parse(fields, "chain_id")?,
        legs,
        parse(fields, "gross_bps")?,
        parse(fields, "net_bps")?,
        parse(fields, "confidence")?,
        parse(fields, "expiry_millis")?,
        pipeline,
        get(fields, "source")?.to_string()
    )
    .map_err(|e| CodecError::MalformedField { field: "invariant", detail: e.to_string() })
}

mod hex {
    pub fn encode(bytes: [u8; 32]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd length hex string".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, U256};

    use super::*;

    fn fixture() -> Opportunity {
        let legs = vec![Leg {
            dex_id: 1,
            token0: address!("0000000000000000000000000000000000000001"),
            token1: address!("0000000000000000000000000000000000000002"),
            amount_in: Some(U256::from(1_000u64)),
            amount_out: None
        }];
        Opportunity::new(
            [7u8; 32],
            OpportunityKind::TwoPair,
            1,
            legs,
            50,
            40,
            0.8,
            2_000,
            PipelineTimestamps { ws_received: 500, published: 1_000, ..Default::default() },
            "detector:ethereum:two_pair".to_string()
        )
        .expect("fixture invariants hold")
    }

    #[test]
    fn round_trips_through_field_map() {
        let opp = fixture();
        let fields = encode_opportunity(&opp);
        let decoded = decode_opportunity(&fields).expect("should decode");
        assert_eq!(decoded.id, opp.id);
        assert_eq!(decoded.net_bps, opp.net_bps);
        assert_eq!(decoded.legs.len(), opp.legs.len());
    }

    #[test]
    fn missing_field_is_reported() {
        let opp = fixture();
        let mut fields = encode_opportunity(&opp);
        fields.remove("net_bps");
        assert!(matches!(decode_opportunity(&fields), Err(CodecError::MissingField("net_bps"))));
    }

    #[test]
    fn malformed_kind_is_reported() {
        let opp = fixture();
        let mut fields = encode_opportunity(&opp);
        fields.insert("kind".to_string(), "not_a_kind".to_string());
        assert!(decode_opportunity(&fields).is_err());
    }
}
