use crate::config::DeviceConfig;
use crate::shared::bounding_box::BoundingBox;

/// Rejects detections that are not plausibly face-shaped.
///
/// A box passes when both edges are at least `min_size` pixels and its
/// width/height ratio lies strictly inside `(min_aspect, max_aspect)`.
/// Accepted boxes keep the detector's order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceFilter {
    min_aspect: f64,
    max_aspect: f64,
    min_size: i32,
}

impl FaceFilter {
    pub fn new(min_aspect: f64, max_aspect: f64, min_size: i32) -> Self {
        Self {
            min_aspect,
            max_aspect,
            min_size,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.min_aspect_ratio,
            config.max_aspect_ratio,
            config.min_face_size,
        )
    }

    pub fn accepts(&self, bbox: &BoundingBox) -> bool {
        if bbox.width < self.min_size || bbox.height < self.min_size {
            return false;
        }
        bbox.aspect_ratio()
            .is_some_and(|ratio| ratio > self.min_aspect && ratio < self.max_aspect)
    }

    pub fn apply(&self, boxes: &[BoundingBox]) -> Vec<BoundingBox> {
        boxes.iter().filter(|b| self.accepts(b)).copied().collect()
    }
}

impl Default for FaceFilter {
    fn default() -> Self {
        Self::from_config(&DeviceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lower_bound_exclusive(120, 160, false)] // 0.75
    #[case::upper_bound_exclusive(130, 100, false)] // 1.3
    #[case::square(100, 100, true)]
    #[case::just_inside_lower(121, 160, true)]
    #[case::just_inside_upper(129, 100, true)]
    #[case::wide(200, 100, false)]
    #[case::tall(100, 200, false)]
    fn test_aspect_ratio_open_interval(
        #[case] width: i32,
        #[case] height: i32,
        #[case] accepted: bool,
    ) {
        let filter = FaceFilter::default();
        assert_eq!(filter.accepts(&BoundingBox::new(0, 0, width, height)), accepted);
    }

    #[rstest]
    #[case::too_small(79, 79, false)]
    #[case::at_minimum(80, 80, true)]
    #[case::one_edge_small(90, 79, false)]
    fn test_minimum_size(#[case] width: i32, #[case] height: i32, #[case] accepted: bool) {
        let filter = FaceFilter::default();
        assert_eq!(filter.accepts(&BoundingBox::new(5, 5, width, height)), accepted);
    }

    #[test]
    fn test_zero_height_rejected_even_without_size_floor() {
        let filter = FaceFilter::new(0.75, 1.3, 0);
        assert!(!filter.accepts(&BoundingBox::new(0, 0, 10, 0)));
    }

    #[test]
    fn test_apply_keeps_detector_order() {
        let boxes = vec![
            BoundingBox::new(300, 0, 100, 100),
            BoundingBox::new(0, 0, 200, 100),
            BoundingBox::new(100, 0, 110, 100),
        ];
        let accepted = FaceFilter::default().apply(&boxes);
        assert_eq!(accepted, vec![boxes[0], boxes[2]]);
    }

    #[test]
    fn test_apply_empty() {
        assert!(FaceFilter::default().apply(&[]).is_empty());
    }

    #[test]
    fn test_from_config_uses_custom_bounds() {
        let config = DeviceConfig {
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.5,
            min_face_size: 10,
            ..DeviceConfig::default()
        };
        let filter = FaceFilter::from_config(&config);
        assert!(filter.accepts(&BoundingBox::new(0, 0, 20, 10)));
    }
}
