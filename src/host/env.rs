//! Portable field sources shared by all platforms: process environment,
//! hostname and time zone lookup.

use crate::host::types::FieldError;
use std::str::FromStr;

/// Read the effective POSIX locale from the environment and reduce it to an
/// identifier such as `en_US` (codeset and modifier stripped).
pub fn locale_from_env() -> Result<String, FieldError> {
    let raw = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| FieldError::Unavailable("no locale variables set".to_string()))?;

    normalize_locale(&raw)
}

/// `en_US.UTF-8@euro` -> `en_US`. `C` and `POSIX` carry no language.
pub fn normalize_locale(raw: &str) -> Result<String, FieldError> {
    let base = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "C" || base == "POSIX" {
        return Err(FieldError::Unavailable(format!(
            "locale '{raw}' does not name a language"
        )));
    }
    Ok(base.to_string())
}

/// Preferred language: first entry of `LANGUAGE`, else derived from the locale.
pub fn language_from_env() -> Result<String, FieldError> {
    if let Ok(list) = std::env::var("LANGUAGE") {
        if let Some(first) = list.split(':').map(str::trim).find(|s| !s.is_empty()) {
            return Ok(language_tag(first));
        }
    }
    locale_from_env().map(|locale| language_tag(&locale))
}

/// Turn a locale identifier into a BCP 47 tag (`pt_BR` -> `pt-BR`).
pub fn language_tag(locale: &str) -> String {
    locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .replace('_', "-")
}

/// Time zone from `TZ`, validated against the IANA database.
pub fn time_zone_from_env() -> Result<String, FieldError> {
    let tz = std::env::var("TZ")
        .map_err(|_| FieldError::Unavailable("TZ not set".to_string()))?;
    validate_time_zone(tz.trim_start_matches(':'))
}

pub fn validate_time_zone(name: &str) -> Result<String, FieldError> {
    chrono_tz::Tz::from_str(name.trim())
        .map(|tz| tz.name().to_string())
        .map_err(|_| FieldError::Parse(format!("unknown time zone '{name}'")))
}

pub fn device_name() -> Result<String, FieldError> {
    let name = hostname::get()?;
    let name = name.to_string_lossy().trim().to_string();
    if name.is_empty() {
        return Err(FieldError::Unavailable("empty hostname".to_string()));
    }
    Ok(name)
}
