use std::sync::Arc;

use crate::remote::domain::control_plane::RemoteControlPlane;
use crate::remote::domain::records::{timestamp_now, BrandingInfo, StatusRecord};

/// Builds complete status records and publishes them, logging failures.
///
/// Publishing is fire-and-forget: a failed write is never retried, the next
/// status supersedes it.
#[derive(Clone)]
pub struct StatusReporter {
    plane: Arc<dyn RemoteControlPlane>,
    branding: BrandingInfo,
}

impl StatusReporter {
    pub fn new(plane: Arc<dyn RemoteControlPlane>, branding: BrandingInfo) -> Self {
        Self { plane, branding }
    }

    pub fn record(&self, active: bool, error: &str) -> StatusRecord {
        StatusRecord {
            active,
            timestamp: timestamp_now(),
            error: error.to_string(),
            branding: self.branding.clone(),
        }
    }

    /// Returns `true` when the remote store accepted the record.
    pub fn publish(&self, active: bool, error: &str) -> bool {
        match self.plane.publish_status(&self.record(active, error)) {
            Ok(()) => {
                log::debug!("Status published: active={active} error={error:?}");
                true
            }
            Err(e) => {
                log::warn!("Status publish failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{Event, ScriptedControlPlane};

    #[test]
    fn test_publish_sends_full_record() {
        let plane = Arc::new(ScriptedControlPlane::new(vec![]));
        let branding = BrandingInfo {
            company: "Co".into(),
            ..BrandingInfo::default()
        };
        let reporter = StatusReporter::new(plane.clone(), branding);

        assert!(reporter.publish(true, ""));
        assert_eq!(
            plane.events(),
            vec![Event::Status {
                active: true,
                error: String::new()
            }]
        );
        assert_eq!(plane.statuses()[0].branding.company, "Co");
    }

    #[test]
    fn test_publish_failure_is_reported_not_raised() {
        let plane = Arc::new(ScriptedControlPlane::new(vec![]).failing_publishes());
        let reporter = StatusReporter::new(plane, BrandingInfo::default());
        assert!(!reporter.publish(false, "stopped"));
    }
}
