//! Date formats used on the wire by logical models.
//!
//! The only external format is `v3`: `YYYY[MM[DD[HH[MM[SS[.U+]]]]]][+|-ZZzz]`.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ElementModelError, Result};

pub const V3_FORMAT: &str = "v3";

static V3_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\.\d+)?([+-]\d{4})?$")
        .expect("v3 date pattern is valid")
});

static FHIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:T(\d{2}):(\d{2})(?::(\d{2})(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$",
    )
    .expect("FHIR dateTime pattern is valid")
});

#[derive(Debug, Default)]
struct DateParts<'a> {
    year: &'a str,
    month: Option<&'a str>,
    day: Option<&'a str>,
    hour: Option<&'a str>,
    minute: Option<&'a str>,
    second: Option<&'a str>,
    fraction: Option<&'a str>,
    zone: Option<String>,
}

impl DateParts<'_> {
    fn validate(&self, original: &str) -> Result<()> {
        let invalid = || ElementModelError::conversion(format!("Invalid date/time value '{original}'"));
        let number = |s: Option<&str>, default: u32| -> Result<u32> {
            s.map_or(Ok(default), |v| v.parse::<u32>().map_err(|_| invalid()))
        };
        let year = self.year.parse::<i32>().map_err(|_| invalid())?;
        let month = number(self.month, 1)?;
        let day = number(self.day, 1)?;
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        if self.hour.is_some() {
            NaiveTime::from_hms_opt(
                number(self.hour, 0)?,
                number(self.minute, 0)?,
                number(self.second, 0)?,
            )
            .ok_or_else(invalid)?;
        }
        if self.zone.is_some() && self.hour.is_none() {
            return Err(invalid());
        }
        Ok(())
    }
}

/// Converts a value from an external date format into a FHIR `dateTime`.
pub fn convert_from_external(format: &str, value: &str) -> Result<String> {
    if format != V3_FORMAT {
        return Err(ElementModelError::format(format!("Unknown Data format '{format}'")));
    }
    v3_to_fhir(value)
}

/// Converts a FHIR `dateTime` into an external date format.
pub fn convert_to_external(format: &str, value: &str) -> Result<String> {
    if format != V3_FORMAT {
        return Err(ElementModelError::format(format!("Unknown Date format '{format}'")));
    }
    fhir_to_v3(value)
}

pub fn v3_to_fhir(value: &str) -> Result<String> {
    let captures = V3_PATTERN.captures(value).ok_or_else(|| {
        ElementModelError::conversion(format!("Unable to parse v3 date/time '{value}'"))
    })?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str());
    let parts = DateParts {
        year: group(1).unwrap_or_default(),
        month: group(2),
        day: group(3),
        hour: group(4),
        minute: group(5),
        second: group(6),
        fraction: group(7),
        zone: group(8).map(|z| format!("{}:{}", &z[..3], &z[3..])),
    };
    if parts.fraction.is_some() && parts.second.is_none() {
        return Err(ElementModelError::conversion(format!(
            "Unable to parse v3 date/time '{value}'"
        )));
    }
    parts.validate(value)?;

    let mut out = parts.year.to_string();
    if let Some(month) = parts.month {
        out.push('-');
        out.push_str(month);
    }
    if let Some(day) = parts.day {
        out.push('-');
        out.push_str(day);
    }
    if let Some(hour) = parts.hour {
        out.push('T');
        out.push_str(hour);
        out.push(':');
        out.push_str(parts.minute.unwrap_or("00"));
        if let Some(second) = parts.second {
            out.push(':');
            out.push_str(second);
        }
        if let Some(fraction) = parts.fraction {
            out.push_str(fraction);
        }
        if let Some(zone) = &parts.zone {
            out.push_str(zone);
        }
    }
    Ok(out)
}

pub fn fhir_to_v3(value: &str) -> Result<String> {
    let captures = FHIR_PATTERN.captures(value).ok_or_else(|| {
        ElementModelError::conversion(format!("Unable to parse dateTime '{value}'"))
    })?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str());
    let parts = DateParts {
        year: group(1).unwrap_or_default(),
        month: group(2),
        day: group(3),
        hour: group(4),
        minute: group(5),
        second: group(6),
        fraction: group(7),
        zone: group(8).map(|z| match z {
            "Z" => "+0000".to_string(),
            other => other.replace(':', ""),
        }),
    };
    parts.validate(value)?;

    let mut out = String::with_capacity(24);
    out.push_str(parts.year);
    for part in [parts.month, parts.day, parts.hour, parts.minute, parts.second]
        .into_iter()
        .flatten()
    {
        out.push_str(part);
    }
    if let Some(fraction) = parts.fraction {
        out.push_str(fraction);
    }
    if let Some(zone) = &parts.zone {
        out.push_str(zone);
    }
    Ok(out)
}
