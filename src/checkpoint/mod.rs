mod params;
mod record;
mod transfer;

pub use params::{drop_containing, merge_into, retain_known, ParameterSet};
pub use record::{CheckpointRecord, CheckpointStore, CheckpointStoreConfig};
pub use transfer::{
    load_checkpoint, restore_from_record, transfer_parameters, ModelHandle, ReplicaLayout,
    Replicated, Restored, StateDict, TransferOptions, TransferReport,
};
