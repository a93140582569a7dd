use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::transforms::TransformPipeline;
use crate::error::DataError;

/// Number of cameras in the DukeMTMC tracking set.
const DUKE_CAMERAS: u32 = 8;

/// Dataset and loader settings, loadable from the `[data]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub name: String,
    pub data_dir: PathBuf,
    pub height: u32,
    pub width: u32,
    pub batch_size: usize,
    pub workers: usize,
    pub combine_trainval: bool,
    /// Random rectangle crop instead of a plain rescale for training.
    pub crop: bool,
    /// Single tracking camera to use; 0 selects all cameras.
    pub tracking_icams: u32,
    pub fps: u32,
    /// Random erasing probability.
    pub re: f32,
    /// Images per identity in a batch; 0 disables identity sampling.
    pub num_instances: usize,
    /// Batch size of the camera-style-transferred loader; 0 disables it.
    pub camstyle: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            name: "market1501".to_string(),
            data_dir: PathBuf::from("data"),
            height: 256,
            width: 128,
            batch_size: 64,
            workers: 4,
            combine_trainval: false,
            crop: false,
            tracking_icams: 0,
            fps: 60,
            re: 0.0,
            num_instances: 0,
            camstyle: 0,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), DataError> {
        if self.name.is_empty() {
            return Err(DataError::InvalidConfig("name must not be empty".into()));
        }
        if self.height == 0 || self.width == 0 {
            return Err(DataError::InvalidConfig(
                "height and width must be > 0".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.re) {
            return Err(DataError::InvalidConfig("re must be in [0, 1]".into()));
        }
        if self.num_instances > self.batch_size {
            return Err(DataError::InvalidConfig(
                "num_instances must be <= batch_size".into(),
            ));
        }
        if self.num_instances > 0 && self.batch_size % self.num_instances != 0 {
            warn!(
                batch_size = self.batch_size,
                num_instances = self.num_instances,
                "batch_size is not a multiple of num_instances; batches will split an identity"
            );
        }
        Ok(())
    }
}

/// Which cameras a tracking dataset is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSelection {
    All,
    Listed(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetKind {
    /// Cropped person images with the usual train/query/gallery splits.
    Standard,
    /// Crops cut from multi-camera tracking ground truth.
    TrackingGt {
        cameras: CameraSelection,
        fps: u32,
        trainval: bool,
    },
}

/// Where a dataset lives and how its factory should build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub name: String,
    pub root: PathBuf,
    pub kind: DatasetKind,
}

impl DatasetSource {
    pub fn resolve(config: &DataConfig) -> Self {
        let root = config.data_dir.join(&config.name);
        let kind = match config.name.as_str() {
            "duke_tracking" => {
                let cameras = if config.tracking_icams != 0 {
                    vec![config.tracking_icams]
                } else {
                    (1..=DUKE_CAMERAS).collect()
                };
                DatasetKind::TrackingGt {
                    cameras: CameraSelection::Listed(cameras),
                    fps: config.fps,
                    trainval: config.combine_trainval,
                }
            }
            "aic_tracking" => DatasetKind::TrackingGt {
                cameras: CameraSelection::All,
                fps: config.fps,
                trainval: config.combine_trainval,
            },
            _ => DatasetKind::Standard,
        };
        DatasetSource {
            name: config.name.clone(),
            root,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Query,
    Gallery,
    Camstyle,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Query => "query",
            Split::Gallery => "gallery",
            Split::Camstyle => "camstyle",
        }
    }
}

/// A dataset already built by its factory.
pub trait ReidDataset {
    /// Number of identities in the training split (classifier width).
    fn num_train_ids(&self) -> usize;
    /// Directory holding the split's images.
    fn split_root(&self, split: Split) -> PathBuf;
    /// Number of examples in the split.
    fn split_len(&self, split: Split) -> usize;
    /// Whether the dataset provides the split at all.
    fn has_split(&self, split: Split) -> bool;
}

/// Dataset summary read from a layout file, for when the dataset itself is
/// built elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub num_train_ids: usize,
    pub train: SplitLayout,
    pub query: SplitLayout,
    pub gallery: SplitLayout,
    #[serde(default)]
    pub camstyle: Option<SplitLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitLayout {
    pub root: PathBuf,
    pub len: usize,
}

impl DatasetLayout {
    /// Read a layout from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::LayoutRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DataError::LayoutParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn split(&self, split: Split) -> Option<&SplitLayout> {
        match split {
            Split::Train => Some(&self.train),
            Split::Query => Some(&self.query),
            Split::Gallery => Some(&self.gallery),
            Split::Camstyle => self.camstyle.as_ref(),
        }
    }
}

impl ReidDataset for DatasetLayout {
    fn num_train_ids(&self) -> usize {
        self.num_train_ids
    }

    fn split_root(&self, split: Split) -> PathBuf {
        self.split(split).map(|s| s.root.clone()).unwrap_or_default()
    }

    fn split_len(&self, split: Split) -> usize {
        self.split(split).map_or(0, |s| s.len)
    }

    fn has_split(&self, split: Split) -> bool {
        self.split(split).is_some()
    }
}

/// How a loader walks its split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum SampleOrder {
    Sequential,
    Shuffled,
    /// Batches of identities, `num_instances` images each.
    RandomIdentity { num_instances: usize },
}

/// Settings for one data loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSpec {
    pub split: Split,
    pub root: PathBuf,
    pub transform: TransformPipeline,
    pub batch_size: usize,
    pub num_workers: usize,
    pub order: SampleOrder,
    pub pin_memory: bool,
    pub drop_last: bool,
    pub num_examples: usize,
}

impl LoaderSpec {
    /// Batches yielded per pass over the split.
    pub fn batches_per_epoch(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        if self.drop_last {
            self.num_examples / self.batch_size
        } else {
            self.num_examples.div_ceil(self.batch_size)
        }
    }
}

/// Everything needed to build the loaders for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderPlan {
    pub source: DatasetSource,
    pub num_classes: usize,
    pub train: LoaderSpec,
    pub query: LoaderSpec,
    pub gallery: LoaderSpec,
    pub camstyle: Option<LoaderSpec>,
}

impl LoaderPlan {
    pub fn build(config: &DataConfig, dataset: &dyn ReidDataset) -> Result<Self, DataError> {
        config.validate()?;
        if config.camstyle > 0 && !dataset.has_split(Split::Camstyle) {
            return Err(DataError::InvalidConfig(
                "camstyle loader requested but dataset has no camstyle split".into(),
            ));
        }

        let source = DatasetSource::resolve(config);
        let train_transform =
            TransformPipeline::train(config.height, config.width, config.crop, config.re);
        let test_transform = TransformPipeline::test(config.height, config.width);

        let train = LoaderSpec {
            split: Split::Train,
            root: dataset.split_root(Split::Train),
            transform: train_transform.clone(),
            batch_size: config.batch_size,
            num_workers: config.workers,
            order: if config.num_instances > 0 {
                SampleOrder::RandomIdentity {
                    num_instances: config.num_instances,
                }
            } else {
                SampleOrder::Shuffled
            },
            pin_memory: true,
            drop_last: true,
            num_examples: dataset.split_len(Split::Train),
        };

        let eval_loader = |split: Split| LoaderSpec {
            split,
            root: dataset.split_root(split),
            transform: test_transform.clone(),
            batch_size: config.batch_size,
            num_workers: config.workers,
            order: SampleOrder::Sequential,
            pin_memory: true,
            drop_last: false,
            num_examples: dataset.split_len(split),
        };
        let query = eval_loader(Split::Query);
        let gallery = eval_loader(Split::Gallery);

        let camstyle = (config.camstyle > 0).then(|| LoaderSpec {
            split: Split::Camstyle,
            root: dataset.split_root(Split::Camstyle),
            transform: train_transform,
            batch_size: config.camstyle,
            num_workers: config.workers,
            order: SampleOrder::Shuffled,
            pin_memory: true,
            drop_last: true,
            num_examples: dataset.split_len(Split::Camstyle),
        });

        debug!(
            dataset = %source.name,
            num_classes = dataset.num_train_ids(),
            train_batches = train.batches_per_epoch(),
            camstyle = camstyle.is_some(),
            "loader plan built"
        );

        Ok(LoaderPlan {
            source,
            num_classes: dataset.num_train_ids(),
            train,
            query,
            gallery,
            camstyle,
        })
    }

    /// All loaders in the plan, train first.
    pub fn loaders(&self) -> Vec<&LoaderSpec> {
        let mut loaders = vec![&self.train, &self.query, &self.gallery];
        if let Some(c) = &self.camstyle {
            loaders.push(c);
        }
        loaders
    }
}
