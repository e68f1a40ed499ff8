//! Sizing: map a capacity / false-positive-rate target to concrete table parameters.

/// Load factor ceiling for sizing. Insertion failure becomes likely once a 4-slot table runs
/// past ~96% occupancy, so the calculator doubles the bucket count instead of crossing it.
const MAX_LOAD_FACTOR: f64 = 0.96;

/// Concrete table parameters of a cuckoo filter.
///
/// Usually produced by [`TableParams::for_capacity`] and consumed by
/// [`CuckooFilter::with_properties`](crate::filter::CuckooFilter::with_properties), but they can
/// also be inspected or tweaked before constructing a filter via
/// [`CuckooFilter::with_params_and_hasher`](crate::filter::CuckooFilter::with_params_and_hasher).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableParams {
    /// Number of buckets, always a power of two.
    pub n_buckets: usize,
    /// Number of fingerprint slots per bucket.
    pub bucketsize: usize,
    /// Fingerprint length in bytes.
    pub fingerprint_len: usize,
    /// Displacement budget of a single insertion.
    pub max_kicks: usize,
}

impl TableParams {
    /// Compute table parameters for an expected number of elements and a target false positive
    /// rate, using 4-slot buckets.
    ///
    /// The fingerprint length follows the standard cuckoo-filter bound
    /// `ε ≈ 2 * bucketsize * 2^-fingerprint_bits`, rounded up to whole bytes. The bucket count is
    /// the next power of two fitting `expected_elements`, doubled once more if the resulting load
    /// factor would exceed 96%. The kick budget equals the bucket count, so the displacement
    /// chain can grow with the table.
    ///
    /// # Panics
    /// If `expected_elements` is zero or `false_positive_rate` is outside `(0, 1)`.
    ///
    /// # Examples
    /// ```
    /// use cuckooset::params::TableParams;
    ///
    /// let params = TableParams::for_capacity(1000, 0.02);
    /// assert_eq!(params.bucketsize, 4);
    /// assert_eq!(params.fingerprint_len, 2);
    /// assert!(params.n_buckets.is_power_of_two());
    /// ```
    pub fn for_capacity(expected_elements: usize, false_positive_rate: f64) -> Self {
        assert!(
            expected_elements >= 1,
            "expected_elements ({}) must be at least 1",
            expected_elements
        );
        assert!(
            (false_positive_rate > 0.) && (false_positive_rate < 1.),
            "false_positive_rate ({}) must be greater than 0 and smaller than 1",
            false_positive_rate
        );

        let bucketsize = 4usize;
        let fingerprint_bits = (2.0 * (bucketsize as f64) / false_positive_rate).log2();
        let fingerprint_len = (fingerprint_bits / 8.0).ceil() as usize;

        let min_buckets = (expected_elements + bucketsize - 1) / bucketsize;
        let mut n_buckets = min_buckets.next_power_of_two();
        if (expected_elements as f64) / ((n_buckets * bucketsize) as f64) > MAX_LOAD_FACTOR {
            n_buckets *= 2;
        }

        Self {
            n_buckets,
            bucketsize,
            fingerprint_len,
            max_kicks: n_buckets,
        }
    }
}
