//! Local argument checks run before any budget is spent or byte is sent.

use super::error::{Error, Invalid};
use super::model::{MAX_KEY_LEN, MAX_NAME_LEN, MAX_VALUE_LEN};

fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Feed and group keys: `[A-Za-z0-9-]+`, optionally followed by one
/// `.`-separated segment of the same alphabet (`weather.humidity`).
pub(crate) fn key(key: &str) -> Result<(), Error> {
    if key.len() > MAX_KEY_LEN {
        return Err(Error::Validation(Invalid::Key));
    }
    let valid = match key.split_once('.') {
        Some((group, feed)) => is_segment(group) && is_segment(feed),
        None => is_segment(key),
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(Invalid::Key))
    }
}

/// Names given to newly created feeds and groups.
pub(crate) fn name(name: &str) -> Result<(), Error> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(Invalid::Name))
    }
}

pub(crate) fn value(value: &str) -> Result<(), Error> {
    if value.is_empty() || value.len() > MAX_VALUE_LEN {
        Err(Error::Validation(Invalid::Value))
    } else {
        Ok(())
    }
}

/// Server-assigned data point identifiers are alphanumeric.
pub(crate) fn data_id(id: &str) -> Result<(), Error> {
    if !id.is_empty() && id.len() <= MAX_KEY_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::Validation(Invalid::Key))
    }
}

/// A user name as it appears as the first topic level and in REST paths.
pub(crate) fn user(user: &str) -> bool {
    !user.is_empty()
        && user
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

pub(crate) fn count(n: usize, max: usize) -> Result<(), Error> {
    if (1..=max).contains(&n) {
        Ok(())
    } else {
        Err(Error::Validation(Invalid::Count))
    }
}
