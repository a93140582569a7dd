use std::collections::BTreeMap;

use burn::tensor::TensorData;

/// Named tensors of a model, keyed by dotted parameter path (`fc.weight`).
pub type ParameterSet = BTreeMap<String, TensorData>;

/// Drop entries of `params` whose key is absent from `reference`.
/// Returns the dropped keys in key order.
pub fn retain_known(params: &mut ParameterSet, reference: &ParameterSet) -> Vec<String> {
    let mut dropped = Vec::new();
    params.retain(|key, _| {
        let known = reference.contains_key(key);
        if !known {
            dropped.push(key.clone());
        }
        known
    });
    dropped
}

/// Drop entries whose key contains `marker` as a substring.
/// Returns the dropped keys in key order.
pub fn drop_containing(params: &mut ParameterSet, marker: &str) -> Vec<String> {
    let mut dropped = Vec::new();
    params.retain(|key, _| {
        let hit = key.contains(marker);
        if hit {
            dropped.push(key.clone());
        }
        !hit
    });
    dropped
}

/// Overwrite `target` entries with `source`. Returns the overwritten keys.
pub fn merge_into(target: &mut ParameterSet, source: ParameterSet) -> Vec<String> {
    let mut written = Vec::with_capacity(source.len());
    for (key, value) in source {
        written.push(key.clone());
        target.insert(key, value);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(value: f32, len: usize) -> TensorData {
        TensorData::new(vec![value; len], [len])
    }

    fn params(entries: &[(&str, f32)]) -> ParameterSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), tensor(*v, 2)))
            .collect()
    }

    #[test]
    fn test_retain_known_drops_unknown_keys() {
        let mut ckpt = params(&[("base.weight", 1.0), ("old.weight", 2.0), ("fc.bias", 3.0)]);
        let model = params(&[("base.weight", 0.0), ("fc.bias", 0.0), ("fc.weight", 0.0)]);

        let dropped = retain_known(&mut ckpt, &model);
        assert_eq!(dropped, vec!["old.weight".to_string()]);
        assert_eq!(
            ckpt.keys().cloned().collect::<Vec<_>>(),
            vec!["base.weight".to_string(), "fc.bias".to_string()]
        );
    }

    #[test]
    fn test_drop_containing_is_substring_match() {
        let mut ckpt = params(&[
            ("classifier.fc.weight", 1.0),
            ("fc.bias", 1.0),
            ("conv1.weight", 1.0),
            ("fcn.head", 1.0),
        ]);
        let dropped = drop_containing(&mut ckpt, "fc");
        assert_eq!(dropped.len(), 3);
        assert_eq!(ckpt.len(), 1);
        assert!(ckpt.contains_key("conv1.weight"));
    }

    #[test]
    fn test_merge_overwrites_and_keeps_others() {
        let mut model = params(&[("a", 0.0), ("b", 0.0)]);
        let written = merge_into(&mut model, params(&[("b", 5.0)]));

        assert_eq!(written, vec!["b".to_string()]);
        assert_eq!(model.len(), 2);
        assert_eq!(model["a"].to_vec::<f32>().unwrap(), vec![0.0, 0.0]);
        assert_eq!(model["b"].to_vec::<f32>().unwrap(), vec![5.0, 5.0]);
    }
}
