//! Sanitation of persisted check records.
//!
//! Records come from storage written by another layer and may be legacy or
//! corrupt. Every field is checked on its own: a field that fails its
//! constraint is treated as missing instead of being carried forward. Only
//! records whose required fields all survive are eligible for probing.

use serde_json::Value;

use super::model::{Check, CheckState, HttpMethod, Protocol};

pub const CHECK_ID_LENGTH: usize = 20;
pub const USER_PHONE_LENGTH: usize = 13;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

/// Result of validating one stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible(Check),
    Ineligible(IneligibleRecord),
}

/// Why a record was skipped, with whatever id could be recovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IneligibleRecord {
    pub id: Option<String>,
    pub missing: Vec<&'static str>,
}

impl IneligibleRecord {
    pub fn reason(&self) -> String {
        if self.missing.is_empty() {
            "record is not an object".to_string()
        } else {
            format!("missing or invalid fields: {}", self.missing.join(", "))
        }
    }
}

impl std::fmt::Display for IneligibleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "check {id}: {}", self.reason()),
            None => write!(f, "check <unknown id>: {}", self.reason()),
        }
    }
}

/// Validate a raw stored record
pub fn validate_check(raw: &Value) -> Eligibility {
    let Some(record) = raw.as_object() else {
        return Eligibility::Ineligible(IneligibleRecord { id: None, missing: Vec::new() });
    };

    let id = record.get("id").and_then(string_of_trimmed_len(CHECK_ID_LENGTH));
    let user_phone = record.get("userPhone").and_then(string_of_trimmed_len(USER_PHONE_LENGTH));
    let protocol = record.get("protocol").and_then(Value::as_str).and_then(Protocol::parse);
    let url = record
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string);
    let method = record.get("method").and_then(Value::as_str).and_then(HttpMethod::parse);
    let success_codes = record.get("successCodes").and_then(parse_success_codes);
    let timeout_seconds = record.get("timeoutSeconds").and_then(parse_timeout);

    // Optional bookkeeping fields fall back to "never probed, down"
    let state =
        record.get("state").and_then(Value::as_str).and_then(CheckState::parse).unwrap_or_default();
    let last_checked = record.get("lastChecked").and_then(Value::as_i64).filter(|ts| *ts > 0);

    match (id, user_phone, protocol, url, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(user_phone),
            Some(protocol),
            Some(url),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => Eligibility::Eligible(Check {
            id,
            user_phone,
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state,
            last_checked,
        }),
        (id, user_phone, protocol, url, method, success_codes, timeout_seconds) => {
            let mut missing = Vec::new();
            if id.is_none() {
                missing.push("id");
            }
            if user_phone.is_none() {
                missing.push("userPhone");
            }
            if protocol.is_none() {
                missing.push("protocol");
            }
            if url.is_none() {
                missing.push("url");
            }
            if method.is_none() {
                missing.push("method");
            }
            if success_codes.is_none() {
                missing.push("successCodes");
            }
            if timeout_seconds.is_none() {
                missing.push("timeoutSeconds");
            }
            Eligibility::Ineligible(IneligibleRecord { id, missing })
        }
    }
}

fn string_of_trimmed_len(len: usize) -> impl Fn(&Value) -> Option<String> {
    move |value| value.as_str().filter(|s| s.trim().len() == len).map(str::to_string)
}

fn parse_success_codes(value: &Value) -> Option<Vec<u16>> {
    let codes = value.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| code.as_u64().and_then(|code| u16::try_from(code).ok()))
        .collect()
}

fn parse_timeout(value: &Value) -> Option<u64> {
    value.as_u64().filter(|secs| *secs > 0 && *secs <= MAX_TIMEOUT_SECONDS)
}
