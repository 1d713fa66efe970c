use anyhow::{bail, Result};

/// 手入力種目（体重など）の数値検証
///
/// 空欄・数値でない・非有限・0以下を弾く。
pub fn parse_manual_value(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("値を入力してください");
    }
    let value: f64 = match trimmed.parse() {
        Ok(v) => v,
        Err(_) => bail!("数値を入力してください: {:?}", trimmed),
    };
    if !value.is_finite() {
        bail!("数値を入力してください: {:?}", trimmed);
    }
    if value <= 0.0 {
        bail!("0より大きい値を入力してください");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_positive_numbers() {
        assert_eq!(parse_manual_value("52.5").unwrap(), 52.5);
        assert_eq!(parse_manual_value(" 60 ").unwrap(), 60.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_manual_value("").is_err());
        assert!(parse_manual_value("abc").is_err());
        assert!(parse_manual_value("NaN").is_err());
        assert!(parse_manual_value("inf").is_err());
        assert!(parse_manual_value("0").is_err());
        assert!(parse_manual_value("-5").is_err());
    }
}
