use std::collections::HashMap;

use crate::hasher::FingerprintHasher;

/// Hasher with an explicit input-to-digest mapping, for hand-built displacement scenarios.
///
/// The derivation-domain IV is ignored: a scenario pins one digest per input, used for both the
/// fingerprint and the index derivation. Panics when asked for an unmapped input, so a scenario
/// cannot silently depend on digests it never pinned down.
#[derive(Clone, Debug)]
pub(crate) struct MappedHasher {
    map: HashMap<Vec<u8>, Vec<u8>>,
}

impl MappedHasher {
    pub(crate) fn from_pairs(pairs: &[(&[u8], &[u8])]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(input, digest)| (input.to_vec(), digest.to_vec()))
                .collect(),
        }
    }
}

impl FingerprintHasher for MappedHasher {
    fn digest(&self, _iv: u64, data: &[u8], out: &mut [u8]) {
        let digest = self
            .map
            .get(data)
            .unwrap_or_else(|| panic!("no digest mapping for input {:?}", data));
        out.copy_from_slice(&digest[..out.len()]);
    }
}
