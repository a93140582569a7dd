mod plan;
mod transforms;

pub use plan::{
    CameraSelection, DataConfig, DatasetKind, DatasetLayout, DatasetSource, LoaderPlan,
    LoaderSpec, ReidDataset, SampleOrder, Split, SplitLayout,
};
pub use transforms::{Interpolation, TransformPipeline, TransformStep, IMAGENET_MEAN, IMAGENET_STD};
