use chrono::NaiveTime;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

pub static RUNTIME: Lazy<std::io::Result<tokio::runtime::Runtime>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
});

pub fn block_on<F: std::future::Future>(fut: F) -> anyhow::Result<F::Output> {
    match RUNTIME.as_ref() {
        Ok(rt) => Ok(rt.block_on(fut)),
        Err(e) => Err(anyhow::anyhow!("failed to build tokio runtime: {e}")),
    }
}

pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Brazilian mobile numbers with country code (13 digits) render as
/// `+55 (11) 99988-7766`; anything else is shown as entered.
pub fn display_phone(phone: &str) -> String {
    let digits = digits_only(phone);
    if digits.len() == 13 {
        format!(
            "+{} ({}) {}-{}",
            &digits[0..2],
            &digits[2..4],
            &digits[4..9],
            &digits[9..]
        )
    } else {
        phone.to_string()
    }
}

pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| Error::InvalidTimeOfDay(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn formats_thirteen_digit_numbers() {
        assert_eq!(display_phone("5511999887766"), "+55 (11) 99988-7766");
        assert_eq!(display_phone("+55 11 99988 7766"), "+55 (11) 99988-7766");
        assert_eq!(display_phone("12345"), "12345");
    }

    #[test]
    fn time_of_day_parsing() {
        let t = parse_time_of_day("07:05").unwrap();
        assert_eq!((t.hour(), t.minute()), (7, 5));
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("9am").is_err());
    }
}
