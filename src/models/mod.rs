use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an upload reservation.
///
/// Transitions only move forward: `Pending -> Using`, `Pending -> Invalid`
/// and `Using -> Invalid`. An `Invalid` reservation is only ever purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Using,
    Invalid,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Using => "using",
            ImageStatus::Invalid => "invalid",
        }
    }

    pub fn can_transition_to(self, next: ImageStatus) -> bool {
        matches!(
            (self, next),
            (ImageStatus::Pending, ImageStatus::Using)
                | (ImageStatus::Pending, ImageStatus::Invalid)
                | (ImageStatus::Using, ImageStatus::Invalid)
        )
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "using" => Ok(ImageStatus::Using),
            "invalid" => Ok(ImageStatus::Invalid),
            other => Err(format!("unknown image status '{}'", other)),
        }
    }
}

/// Metadata row tracking one upload slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub owner_id: String,
    pub key: String,
    pub status: ImageStatus,
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn pending(owner_id: &str, key: &str, expiry: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            key: key.to_string(),
            status: ImageStatus::Pending,
            expiry,
            created_at: now,
        }
    }

    /// Moves the record to `next`, rejecting backward or sideways moves.
    pub fn transition(&mut self, next: ImageStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "illegal transition {} -> {} for {}",
                self.status, next, self.key
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        self.status == ImageStatus::Invalid && self.expiry < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ImageStatus) -> ImageRecord {
        let now = Utc::now();
        let mut r = ImageRecord::pending("owner", "v2_key", now, now);
        r.status = status;
        r
    }

    #[test]
    fn test_forward_transitions_are_allowed() {
        let mut r = record(ImageStatus::Pending);
        r.transition(ImageStatus::Using).unwrap();
        r.transition(ImageStatus::Invalid).unwrap();
        assert_eq!(r.status, ImageStatus::Invalid);

        let mut r = record(ImageStatus::Pending);
        r.transition(ImageStatus::Invalid).unwrap();
    }

    #[test]
    fn test_nothing_leaves_invalid() {
        for next in [ImageStatus::Pending, ImageStatus::Using, ImageStatus::Invalid] {
            let mut r = record(ImageStatus::Invalid);
            assert!(r.transition(next).is_err());
            assert_eq!(r.status, ImageStatus::Invalid);
        }
    }

    #[test]
    fn test_using_cannot_go_back_to_pending() {
        let mut r = record(ImageStatus::Using);
        assert!(r.transition(ImageStatus::Pending).is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [ImageStatus::Pending, ImageStatus::Using, ImageStatus::Invalid] {
            assert_eq!(status.as_str().parse::<ImageStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ImageStatus>().is_err());
    }

    #[test]
    fn test_purgeable_requires_invalid_and_past_expiry() {
        let now = Utc::now();
        let mut r = record(ImageStatus::Invalid);
        r.expiry = now + chrono::Duration::seconds(5);
        assert!(!r.is_purgeable(now));
        r.expiry = now - chrono::Duration::seconds(1);
        assert!(r.is_purgeable(now));
        r.status = ImageStatus::Using;
        assert!(!r.is_purgeable(now));
    }
}
