use serde::{Deserialize, Serialize};

/// ImageNet channel means, in RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations, in RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Bilinear,
    Bicubic,
}

/// One step of an image preprocessing pipeline. Applying the steps is the
/// job of the image backend; this only says which ones run and in what order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    /// Random crop with random area and aspect ratio, resized to the target.
    RandomSizedRectCrop {
        height: u32,
        width: u32,
        interpolation: Interpolation,
    },
    /// Plain resize to the target, ignoring aspect ratio.
    RectScale {
        height: u32,
        width: u32,
        interpolation: Interpolation,
    },
    RandomHorizontalFlip,
    ToTensor,
    Normalize { mean: [f32; 3], std: [f32; 3] },
    /// Erase a random rectangle with the given probability.
    RandomErasing { probability: f32 },
}

impl TransformStep {
    /// Whether the step draws random numbers.
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            TransformStep::RandomSizedRectCrop { .. }
                | TransformStep::RandomHorizontalFlip
                | TransformStep::RandomErasing { .. }
        )
    }
}

/// Ordered list of preprocessing steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPipeline {
    steps: Vec<TransformStep>,
}

impl TransformPipeline {
    /// Training augmentation: crop or rescale, flip, tensor conversion,
    /// normalization, then random erasing with probability `erasing`.
    pub fn train(height: u32, width: u32, crop: bool, erasing: f32) -> Self {
        let resize = if crop {
            TransformStep::RandomSizedRectCrop {
                height,
                width,
                interpolation: Interpolation::Bicubic,
            }
        } else {
            TransformStep::RectScale {
                height,
                width,
                interpolation: Interpolation::Bicubic,
            }
        };
        TransformPipeline {
            steps: vec![
                resize,
                TransformStep::RandomHorizontalFlip,
                TransformStep::ToTensor,
                imagenet_normalize(),
                TransformStep::RandomErasing {
                    probability: erasing,
                },
            ],
        }
    }

    /// Deterministic evaluation preprocessing.
    pub fn test(height: u32, width: u32) -> Self {
        TransformPipeline {
            steps: vec![
                TransformStep::RectScale {
                    height,
                    width,
                    interpolation: Interpolation::Bicubic,
                },
                TransformStep::ToTensor,
                imagenet_normalize(),
            ],
        }
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn is_deterministic(&self) -> bool {
        !self.steps.iter().any(TransformStep::is_random)
    }
}

fn imagenet_normalize() -> TransformStep {
    TransformStep::Normalize {
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    }
}
