use serde_json::Value;

use salsa_core::error::DomainError;
use salsa_core::stage::Stage;
use salsa_ports::error::SourceError;

/// Parses the national status body. The feed reports `stage + 1`, so a raw
/// `1` means no load shedding. Bare and quoted numbers are both accepted.
pub fn parse_status(body: &str) -> Result<Stage, SourceError> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| SourceError::Malformed(format!("status body {body:?}: {e}")))?;

    let raw = match &value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| SourceError::Malformed(format!("status body {body:?} is not an integer")))?;

    Stage::from_raw(raw - 1).map_err(|e| match e {
        DomainError::NegativeStage(level) => SourceError::NegativeStage(level),
        other => SourceError::Malformed(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_value_is_offset_by_one() {
        assert_eq!(parse_status("1").unwrap(), Stage::NONE);
        assert_eq!(parse_status("3").unwrap(), Stage::new(2));
        assert_eq!(parse_status("\"5\"\n").unwrap(), Stage::new(4));
    }

    #[test]
    fn unknown_status_is_negative() {
        assert!(matches!(
            parse_status("-1"),
            Err(SourceError::NegativeStage(-2))
        ));
        assert!(matches!(
            parse_status("0"),
            Err(SourceError::NegativeStage(-1))
        ));
    }

    #[test]
    fn oversized_status_is_malformed() {
        assert!(matches!(
            parse_status("1000"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_status("<html>down</html>"),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_status("[1]"),
            Err(SourceError::Malformed(_))
        ));
    }
}
