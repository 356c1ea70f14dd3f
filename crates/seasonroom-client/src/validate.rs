use regex::Regex;

use crate::dto::GuestInfo;
use crate::error::ClientError;

/// Korean mobile numbers, with or without hyphens.
const MOBILE_PATTERN: &str = r"^(01[016789])-?(\d{3,4})-?(\d{4})$";

/// Canonical `010-1234-5678` form of a mobile number.
pub fn normalize_phone(raw: &str) -> Result<String, ClientError> {
    let re = Regex::new(MOBILE_PATTERN)
        .map_err(|e| ClientError::Validation(format!("phone pattern: {e}")))?;
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = re
        .captures(&compact)
        .ok_or_else(|| ClientError::Validation(format!("not a mobile number: {raw}")))?;
    Ok(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

pub fn guest_info(name: &str, phone: &str) -> Result<GuestInfo, ClientError> {
    let guest = GuestInfo {
        name: name.trim().to_string(),
        phone_number: normalize_phone(phone)?,
    };
    check_guest(&guest)?;
    Ok(guest)
}

/// Rejects guest details the server would refuse, before any request.
pub fn check_guest(guest: &GuestInfo) -> Result<(), ClientError> {
    if guest.name.trim().is_empty() {
        return Err(ClientError::Validation("guest name is empty".to_string()));
    }
    normalize_phone(&guest.phone_number)?;
    Ok(())
}
