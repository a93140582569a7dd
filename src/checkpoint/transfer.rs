use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::checkpoint::params::{drop_containing, merge_into, retain_known, ParameterSet};
use crate::checkpoint::record::CheckpointRecord;
use crate::error::CheckpointError;

/// A model whose parameters can be exported and replaced by name.
pub trait StateDict: Sized {
    type Device: Clone + fmt::Debug;

    /// Snapshot of every named parameter.
    fn state_dict(&self) -> ParameterSet;

    /// Replace every parameter by key. Missing or extra keys are errors.
    fn load_state_dict(&mut self, params: ParameterSet) -> Result<(), CheckpointError>;

    /// Move all parameters to `device`.
    fn move_to(self, device: &Self::Device) -> Self;
}

/// Where a replicated model lives: the host it is unwrapped to and the
/// accelerator devices it is replicated across.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaLayout<D> {
    pub host: D,
    pub devices: Vec<D>,
}

impl<D> ReplicaLayout<D> {
    pub fn new(host: D, devices: Vec<D>) -> Self {
        ReplicaLayout { host, devices }
    }

    /// Device holding the master copy. Falls back to the host when no
    /// accelerator is listed.
    pub fn primary(&self) -> &D {
        self.devices.first().unwrap_or(&self.host)
    }
}

/// A model replicated across accelerator devices.
pub struct Replicated<M: StateDict> {
    module: M,
    layout: ReplicaLayout<M::Device>,
}

impl<M: StateDict> Replicated<M> {
    /// Wrap `module`, moving it onto the layout's primary device.
    pub fn new(module: M, layout: ReplicaLayout<M::Device>) -> Self {
        let module = module.move_to(layout.primary());
        Replicated { module, layout }
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn layout(&self) -> &ReplicaLayout<M::Device> {
        &self.layout
    }

    /// Unwrap, moving the module back to host memory.
    pub fn into_host(self) -> (M, ReplicaLayout<M::Device>) {
        let module = self.module.move_to(&self.layout.host);
        (module, self.layout)
    }
}

/// A model handle that records whether the model is replicated.
pub enum ModelHandle<M: StateDict> {
    Plain(M),
    Replicated(Replicated<M>),
}

impl<M: StateDict> ModelHandle<M> {
    pub fn replicated(module: M, layout: ReplicaLayout<M::Device>) -> Self {
        ModelHandle::Replicated(Replicated::new(module, layout))
    }

    pub fn is_replicated(&self) -> bool {
        matches!(self, ModelHandle::Replicated(_))
    }

    pub fn module(&self) -> &M {
        match self {
            ModelHandle::Plain(m) => m,
            ModelHandle::Replicated(r) => r.module(),
        }
    }

    /// The bare module, wherever it currently lives.
    pub fn into_module(self) -> M {
        match self {
            ModelHandle::Plain(m) => m,
            ModelHandle::Replicated(r) => r.module,
        }
    }
}

/// Controls which checkpoint parameters are transferred.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Skip classifier-head parameters, for restoring a backbone whose
    /// output layer may have a different class count.
    pub eval_only: bool,
    /// Substring identifying classifier-head parameters.
    pub head_marker: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            eval_only: false,
            head_marker: "fc".to_string(),
        }
    }
}

impl TransferOptions {
    pub fn eval_only() -> Self {
        TransferOptions {
            eval_only: true,
            ..Default::default()
        }
    }
}

/// What happened to each checkpoint key during a transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferReport {
    /// Keys copied into the model.
    pub loaded: Vec<String>,
    /// Checkpoint keys the model does not have.
    pub unknown: Vec<String>,
    /// Known keys skipped because they matched the head marker.
    pub excluded: Vec<String>,
}

/// Merge `checkpoint` into `model_dict` under `options`.
///
/// Every key of `model_dict` survives; keys absent from the checkpoint keep
/// their current values.
pub fn transfer_parameters(
    model_dict: &mut ParameterSet,
    mut checkpoint: ParameterSet,
    options: &TransferOptions,
) -> TransferReport {
    let unknown = retain_known(&mut checkpoint, model_dict);
    let excluded = if options.eval_only {
        drop_containing(&mut checkpoint, &options.head_marker)
    } else {
        Vec::new()
    };
    let loaded = merge_into(model_dict, checkpoint);

    TransferReport {
        loaded,
        unknown,
        excluded,
    }
}

/// A model restored from a checkpoint, with the training progress it carried.
pub struct Restored<M: StateDict> {
    pub model: ModelHandle<M>,
    pub start_epoch: usize,
    pub best_top1: f64,
    pub report: TransferReport,
}

/// Apply an already decoded checkpoint to `model`.
///
/// A replicated model is unwrapped to host memory for the merge and wrapped
/// again across the same devices afterwards.
pub fn restore_from_record<M: StateDict>(
    model: ModelHandle<M>,
    record: CheckpointRecord,
    options: &TransferOptions,
) -> Result<Restored<M>, CheckpointError> {
    let (mut module, layout) = match model {
        ModelHandle::Plain(m) => (m, None),
        ModelHandle::Replicated(r) => {
            let (m, layout) = r.into_host();
            (m, Some(layout))
        }
    };

    let mut model_dict = module.state_dict();
    let report = transfer_parameters(&mut model_dict, record.state_dict, options);
    if !report.unknown.is_empty() {
        debug!(keys = ?report.unknown, "ignoring checkpoint parameters unknown to the model");
    }
    module.load_state_dict(model_dict)?;

    let model = match layout {
        Some(layout) => ModelHandle::replicated(module, layout),
        None => ModelHandle::Plain(module),
    };

    info!(
        epoch = record.epoch,
        best_top1 = record.best_top1,
        loaded = report.loaded.len(),
        excluded = report.excluded.len(),
        "restored checkpoint"
    );

    Ok(Restored {
        model,
        start_epoch: record.epoch,
        best_top1: record.best_top1,
        report,
    })
}

/// Load the checkpoint at `path` into `model`.
///
/// Read and decode failures are returned as-is; there is no retry.
pub fn load_checkpoint<M: StateDict>(
    model: ModelHandle<M>,
    path: &Path,
    options: &TransferOptions,
) -> Result<Restored<M>, CheckpointError> {
    let record = CheckpointRecord::load(path)?;
    restore_from_record(model, record, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FakeDevice {
        Cpu,
        Gpu(usize),
    }

    struct FakeModel {
        params: ParameterSet,
        device: FakeDevice,
        moves: Vec<FakeDevice>,
    }

    impl FakeModel {
        fn new(entries: &[(&str, f32)]) -> Self {
            FakeModel {
                params: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), tensor(*v)))
                    .collect(),
                device: FakeDevice::Cpu,
                moves: Vec::new(),
            }
        }

        fn value(&self, key: &str) -> f32 {
            self.params[key].to_vec::<f32>().unwrap()[0]
        }
    }

    impl StateDict for FakeModel {
        type Device = FakeDevice;

        fn state_dict(&self) -> ParameterSet {
            self.params.clone()
        }

        fn load_state_dict(&mut self, params: ParameterSet) -> Result<(), CheckpointError> {
            if let Some(key) = self.params.keys().find(|k| !params.contains_key(*k)) {
                return Err(CheckpointError::MissingParameter(key.clone()));
            }
            if let Some(key) = params.keys().find(|k| !self.params.contains_key(*k)) {
                return Err(CheckpointError::UnexpectedParameter(key.clone()));
            }
            self.params = params;
            Ok(())
        }

        fn move_to(mut self, device: &FakeDevice) -> Self {
            self.device = *device;
            self.moves.push(*device);
            self
        }
    }

    fn tensor(value: f32) -> TensorData {
        TensorData::new(vec![value; 3], [3])
    }

    fn checkpoint(entries: &[(&str, f32)], epoch: usize, best_top1: f64) -> CheckpointRecord {
        CheckpointRecord {
            state_dict: entries
                .iter()
                .map(|(k, v)| (k.to_string(), tensor(*v)))
                .collect(),
            epoch,
            best_top1,
        }
    }

    fn fresh_model() -> FakeModel {
        FakeModel::new(&[
            ("base.conv.weight", 0.0),
            ("base.bn.bias", 0.0),
            ("fc.weight", 0.0),
            ("fc.bias", 0.0),
        ])
    }

    #[test]
    fn test_transfer_keeps_every_model_key() {
        let mut model_dict = fresh_model().state_dict();
        let before: Vec<String> = model_dict.keys().cloned().collect();
        let ckpt = checkpoint(&[("base.conv.weight", 1.0), ("extra.weight", 9.0)], 0, 0.0);

        let report =
            transfer_parameters(&mut model_dict, ckpt.state_dict, &TransferOptions::default());
        let after: Vec<String> = model_dict.keys().cloned().collect();

        assert_eq!(before, after);
        assert_eq!(report.loaded, vec!["base.conv.weight".to_string()]);
        assert_eq!(report.unknown, vec!["extra.weight".to_string()]);
        assert!(report.excluded.is_empty());
    }

    #[test]
    fn test_full_restore_overwrites_head() {
        let ckpt = checkpoint(&[("base.conv.weight", 1.0), ("fc.weight", 2.0)], 12, 0.5);
        let restored = restore_from_record(
            ModelHandle::Plain(fresh_model()),
            ckpt,
            &TransferOptions::default(),
        )
        .unwrap();

        let model = restored.model.module();
        assert_eq!(model.value("base.conv.weight"), 1.0);
        assert_eq!(model.value("fc.weight"), 2.0);
        assert_eq!(model.value("fc.bias"), 0.0);
        assert_eq!(model.value("base.bn.bias"), 0.0);
    }

    #[test]
    fn test_eval_only_skips_checkpoint_head() {
        let ckpt = checkpoint(
            &[
                ("base.conv.weight", 1.0),
                ("base.bn.bias", 1.5),
                ("fc.weight", 2.0),
                ("fc.bias", 3.0),
            ],
            30,
            0.9,
        );
        let restored = restore_from_record(
            ModelHandle::Plain(fresh_model()),
            ckpt,
            &TransferOptions::eval_only(),
        )
        .unwrap();

        let model = restored.model.module();
        assert_eq!(model.value("base.conv.weight"), 1.0);
        assert_eq!(model.value("base.bn.bias"), 1.5);
        // Head parameters stay at their fresh values but are still present.
        assert_eq!(model.value("fc.weight"), 0.0);
        assert_eq!(model.value("fc.bias"), 0.0);
        assert_eq!(model.params.len(), 4);
        assert!(restored.report.loaded.iter().all(|k| !k.contains("fc")));
        assert_eq!(restored.report.excluded.len(), 2);
    }

    #[test]
    fn test_custom_head_marker() {
        let mut model_dict = FakeModel::new(&[("classifier.weight", 0.0), ("fc.weight", 0.0)])
            .state_dict();
        let ckpt = checkpoint(&[("classifier.weight", 1.0), ("fc.weight", 1.0)], 0, 0.0);
        let options = TransferOptions {
            eval_only: true,
            head_marker: "classifier".to_string(),
        };

        let report = transfer_parameters(&mut model_dict, ckpt.state_dict, &options);
        assert_eq!(report.excluded, vec!["classifier.weight".to_string()]);
        assert_eq!(report.loaded, vec!["fc.weight".to_string()]);
    }

    #[test]
    fn test_metadata_returned_verbatim() {
        let ckpt = checkpoint(&[("fc.bias", 1.0)], 57, 0.873_421_5);
        let restored = restore_from_record(
            ModelHandle::Plain(fresh_model()),
            ckpt,
            &TransferOptions::default(),
        )
        .unwrap();
        assert_eq!(restored.start_epoch, 57);
        assert_eq!(restored.best_top1, 0.873_421_5);
    }

    #[test]
    fn test_plain_stays_plain() {
        let ckpt = checkpoint(&[("fc.bias", 1.0)], 1, 0.1);
        let restored = restore_from_record(
            ModelHandle::Plain(fresh_model()),
            ckpt,
            &TransferOptions::default(),
        )
        .unwrap();
        assert!(!restored.model.is_replicated());
        assert!(restored.model.module().moves.is_empty());
    }

    #[test]
    fn test_replicated_is_rewrapped() {
        let layout = ReplicaLayout::new(
            FakeDevice::Cpu,
            vec![FakeDevice::Gpu(0), FakeDevice::Gpu(1)],
        );
        let handle = ModelHandle::replicated(fresh_model(), layout.clone());
        assert_eq!(handle.module().device, FakeDevice::Gpu(0));

        let ckpt = checkpoint(&[("base.conv.weight", 4.0)], 3, 0.2);
        let restored = restore_from_record(handle, ckpt, &TransferOptions::default()).unwrap();

        assert!(restored.model.is_replicated());
        let model = restored.model.module();
        assert_eq!(model.device, FakeDevice::Gpu(0));
        // wrap -> host for the merge -> wrap again
        assert_eq!(
            model.moves,
            vec![FakeDevice::Gpu(0), FakeDevice::Cpu, FakeDevice::Gpu(0)]
        );
        assert_eq!(model.value("base.conv.weight"), 4.0);

        match &restored.model {
            ModelHandle::Replicated(r) => assert_eq!(r.layout(), &layout),
            ModelHandle::Plain(_) => panic!("expected a replicated handle"),
        }

        // Unwrapping the handle leaves the module on the replica device.
        let module = restored.model.into_module();
        assert_eq!(module.device, FakeDevice::Gpu(0));
        assert_eq!(module.moves.len(), 3);
    }

    #[test]
    fn test_layout_without_devices_uses_host() {
        let layout: ReplicaLayout<FakeDevice> = ReplicaLayout::new(FakeDevice::Cpu, Vec::new());
        assert_eq!(layout.primary(), &FakeDevice::Cpu);
    }

    #[test]
    fn test_load_checkpoint_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.mpk");
        checkpoint(&[("base.bn.bias", 7.0), ("stale.weight", 1.0)], 88, 0.66)
            .save(&path)
            .unwrap();

        let restored = load_checkpoint(
            ModelHandle::Plain(fresh_model()),
            &path,
            &TransferOptions::default(),
        )
        .unwrap();
        assert_eq!(restored.start_epoch, 88);
        assert_eq!(restored.best_top1, 0.66);
        assert_eq!(restored.model.module().value("base.bn.bias"), 7.0);
        assert_eq!(restored.report.unknown, vec!["stale.weight".to_string()]);
    }

    #[test]
    fn test_load_checkpoint_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_checkpoint(
            ModelHandle::Plain(fresh_model()),
            &dir.path().join("nope.mpk"),
            &TransferOptions::default(),
        );
        match result {
            Err(err) => assert!(err.is_read_error(), "unexpected error: {err}"),
            Ok(_) => panic!("loading a missing checkpoint should fail"),
        }
    }
}
