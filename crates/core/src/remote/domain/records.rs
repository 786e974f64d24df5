use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::BrandingConfig;
use crate::shared::constants::TIMESTAMP_FORMAT;

/// Attribution block attached to every status record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandingInfo {
    pub made_by: String,
    pub company: String,
    pub text: String,
    pub logo_base64: Option<String>,
}

impl BrandingInfo {
    /// Builds branding from config, embedding the logo when the file exists.
    pub fn from_config(config: &BrandingConfig) -> Self {
        Self {
            made_by: config.made_by.clone(),
            company: config.company.clone(),
            text: config.text.clone(),
            logo_base64: config.logo_path.as_deref().and_then(load_logo),
        }
    }
}

fn load_logo(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        Err(e) => {
            log::warn!("Failed to read logo {}: {e}", path.display());
            None
        }
    }
}

/// Snapshot of device activity. `active` means a face is visible in the most
/// recently processed frame; it is not a liveness heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(rename = "is_recognition_active")]
    pub active: bool,
    #[serde(rename = "last_active")]
    pub timestamp: String,
    pub error: String,
    pub branding: BrandingInfo,
}

/// One uploaded face crop. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub timestamp: String,
    #[serde(rename = "image_base64")]
    pub image: String,
}

/// Local wall-clock time in the record timestamp layout.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_record_uses_store_field_names() {
        let record = StatusRecord {
            active: true,
            timestamp: "2024-01-02 03:04:05".into(),
            error: String::new(),
            branding: BrandingInfo {
                made_by: "A".into(),
                company: "B".into(),
                text: "A for B".into(),
                logo_base64: None,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["is_recognition_active"], true);
        assert_eq!(json["last_active"], "2024-01-02 03:04:05");
        assert_eq!(json["error"], "");
        assert_eq!(json["branding"]["made_by"], "A");
        assert!(json["branding"]["logo_base64"].is_null());
    }

    #[test]
    fn test_face_record_uses_store_field_names() {
        let record = FaceRecord {
            timestamp: "t".into(),
            image: "aGk=".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image_base64"], "aGk=");
        assert_eq!(json["timestamp"], "t");
    }

    #[test]
    fn test_timestamp_layout() {
        let ts = timestamp_now();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_branding_embeds_existing_logo() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, b"hi").unwrap();

        let branding = BrandingInfo::from_config(&BrandingConfig {
            made_by: "Maker".into(),
            company: "Co".into(),
            text: "Made by Maker for Co".into(),
            logo_path: Some(logo),
        });
        assert_eq!(branding.logo_base64.as_deref(), Some("aGk="));
        assert_eq!(branding.company, "Co");
    }

    #[test]
    fn test_branding_missing_logo_is_none() {
        let branding = BrandingInfo::from_config(&BrandingConfig {
            logo_path: Some(PathBuf::from("/nonexistent/logo.png")),
            ..BrandingConfig::default()
        });
        assert!(branding.logo_base64.is_none());
    }
}
