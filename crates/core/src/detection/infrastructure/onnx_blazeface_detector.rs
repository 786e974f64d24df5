/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Short-range model: a 128x128 RGB input, 896 anchors, one score and
/// sixteen regressor values (box + six keypoints) per anchor.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

const INPUT_SIZE: u32 = 128;

const NMS_IOU_THRESH: f32 = 0.3;

const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor tensor.
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!("Loaded BlazeFace model from {}", model_path.display());
        Ok(Self {
            session,
            confidence: confidence as f32,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        let (tensor, placement) = letterbox(frame, INPUT_SIZE);
        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input])?;
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.confidence,
            &placement,
        );
        Ok(nms(&mut candidates, NMS_IOU_THRESH)
            .iter()
            .filter_map(|c| c.to_bounding_box(frame.width(), frame.height()))
            .collect())
    }
}

/// Where the frame landed inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Placement {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    frame_w: f32,
    frame_h: f32,
}

impl Placement {
    /// Maps a point in model-input pixels back to frame pixels.
    fn to_frame(self, x: f32, y: f32) -> (f32, f32) {
        (
            ((x - self.pad_x) / self.scale).clamp(0.0, self.frame_w),
            ((y - self.pad_y) / self.scale).clamp(0.0, self.frame_h),
        )
    }
}

/// Letterbox-resize to `size x size` so faces keep their proportions.
/// Padding is black; pixels are scaled to [0,1], NCHW.
fn letterbox(frame: &Frame, size: u32) -> (ndarray::Array4<f32>, Placement) {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let target = size as f32;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).clamp(1, size);
    let new_h = ((fh * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let (ty, tx) = (pad_y as usize + y, pad_x as usize + x);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    let placement = Placement {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        frame_w: fw,
        frame_h: fh,
    };
    (tensor, placement)
}

/// Anchor centres for the 16x16 (2 per cell) and 8x8 (6 per cell) grids.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)];
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, per_cell) in &strides {
        let grid = INPUT_SIZE as usize / stride;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                anchors.extend(std::iter::repeat([cx, cy]).take(per_cell));
            }
        }
    }
    anchors
}

/// Box corners in frame pixels plus the anchor score.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        if inter == 0.0 {
            return 0.0;
        }
        let area = |c: &Candidate| (c.x2 - c.x1) * (c.y2 - c.y1);
        inter / (area(self) + area(other) - inter)
    }

    fn to_bounding_box(self, frame_w: u32, frame_h: u32) -> Option<BoundingBox> {
        BoundingBox::new(
            self.x1 as i32,
            self.y1 as i32,
            (self.x2 - self.x1) as i32,
            (self.y2 - self.y1) as i32,
        )
        .clamp_to(frame_w, frame_h)
    }
}

fn decode(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    placement: &Placement,
) -> Vec<Candidate> {
    let input = INPUT_SIZE as f32;

    scores
        .iter()
        .zip(anchors)
        .enumerate()
        .filter_map(|(i, (&raw, anchor))| {
            let score = sigmoid(raw);
            let reg = regressors.get(i * REGRESSOR_STRIDE..i * REGRESSOR_STRIDE + 4)?;
            if score < confidence {
                return None;
            }
            // Regressors are in input pixels relative to the anchor centre.
            let cx = anchor[0] * input + reg[0];
            let cy = anchor[1] * input + reg[1];
            let (w, h) = (reg[2], reg[3]);
            let (x1, y1) = placement.to_frame(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = placement.to_frame(cx + w / 2.0, cy + h / 2.0);
            Some(Candidate {
                x1,
                y1,
                x2,
                y2,
                score,
            })
        })
        .collect()
}

fn nms(candidates: &mut [Candidate], iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for c in candidates.iter() {
        if keep.iter().all(|k| k.iou(c) <= iou_thresh) {
            keep.push(*c);
        }
    }
    keep
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
