//! CuckooFilter implementation.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use rand::Rng;

use crate::hasher::{FingerprintHasher, Xxh3Hasher};
use crate::params::TableParams;
use crate::slab;

/// Longest supported fingerprint in bytes.
///
/// Hash and swap scratch buffers are fixed-size stack arrays of this length, which keeps
/// `contains`, `try_insert` and `remove` free of allocations. 16 bytes corresponds to a 128-bit
/// fingerprint, far below any practically reachable false-positive target.
pub const MAX_FINGERPRINT_LEN: usize = 16;

/// Error struct used to signal that a `CuckooFilter` is full, i.e. that a value cannot be inserted
/// because the implementation was unable to find a free slot within the kick budget.
#[derive(Debug, Clone, Copy)]
pub struct CuckooFilterFull;

impl fmt::Display for CuckooFilterFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cuckoo filter is full")
    }
}

impl std::error::Error for CuckooFilterFull {}

/// Error struct used to signal invalid construction parameters.
///
/// No filter is produced when construction fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The requested bucket count is not a power of two.
    ///
    /// The alternate-index relation `i2 = i1 ^ (h(fp) & (n_buckets - 1))` is only an involution
    /// for power-of-two tables.
    NBucketsNotPowerOfTwo {
        /// The offending bucket count.
        n_buckets: usize,
    },
    /// A parameter that must be positive was zero.
    ParameterZero {
        /// Name of the offending parameter.
        name: &'static str,
    },
    /// The requested fingerprint length exceeds [`MAX_FINGERPRINT_LEN`].
    FingerprintTooLong {
        /// The offending fingerprint length in bytes.
        fingerprint_len: usize,
    },
    /// A table byte image whose length is not a multiple of `bucketsize * fingerprint_len`.
    TableLengthMismatch {
        /// Length of the offered table in bytes.
        len: usize,
        /// Byte length of one bucket.
        bucket_bytes: usize,
    },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NBucketsNotPowerOfTwo { n_buckets } => {
                write!(f, "n_buckets ({}) must be a power of 2", n_buckets)
            }
            Self::ParameterZero { name } => write!(f, "{} must be greater than 0", name),
            Self::FingerprintTooLong { fingerprint_len } => write!(
                f,
                "fingerprint_len ({}) must be less or equal than {}",
                fingerprint_len, MAX_FINGERPRINT_LEN
            ),
            Self::TableLengthMismatch { len, bucket_bytes } => write!(
                f,
                "table length ({}) must be a multiple of the bucket length ({})",
                len, bucket_bytes
            ),
        }
    }
}

impl std::error::Error for ParamError {}

/// Serializable byte image of a [`CuckooFilter`].
///
/// Carries the table parameters plus the packed bucket bytes verbatim; the bucket count is
/// implied by `buckets.len()`. Produced by [`CuckooFilter::image`] and turned back into an equal
/// filter by [`CuckooFilter::from_image`]. With the `serde` feature enabled the image can be
/// written to and read from any serde format.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterImage {
    /// Packed bucket bytes, `n_buckets * bucketsize * fingerprint_len` long.
    pub buckets: Vec<u8>,
    /// Number of fingerprint slots per bucket.
    pub bucketsize: usize,
    /// Fingerprint length in bytes.
    pub fingerprint_len: usize,
    /// Displacement budget of a single insertion.
    pub max_kicks: usize,
}

/// A CuckooFilter is a set-like data structure, that keeps track of elements it has seen without
/// the need to store them. Looking up values has a certain false positive rate, but a false
/// negative rate of 0%. In contrast to a Bloom filter, elements can also be deleted again.
///
/// Elements are arbitrary byte strings. The filter is owned and mutated by a single component;
/// `contains` only reads the table and uses stack-local scratch, so shared concurrent lookups are
/// fine, while mutation requires external mutual exclusion.
///
/// # Examples
/// ```
/// use cuckooset::filter::CuckooFilter;
/// use cuckooset::rand::SeedableRng;
/// use rand_chacha::ChaChaRng;
///
/// // set up filter
/// let false_positive_rate = 0.02;  // = 2%
/// let expected_elements = 1000;
/// let rng = ChaChaRng::from_seed([0; 32]);
/// let mut filter = CuckooFilter::with_properties(false_positive_rate, expected_elements, rng);
///
/// // add some data
/// filter.insert(b"my super long string").unwrap();
///
/// // later
/// assert!(filter.contains(b"my super long string"));
/// assert!(!filter.contains(b"another super long string"));
/// ```
///
/// # How It Works
///
/// The table is a row of `n_buckets` buckets, each holding `bucketsize` slots of
/// `fingerprint_len` bytes, packed into one byte array. A slot of all-zero bytes is free.
///
/// For an element, a `fingerprint_len`-byte fingerprint is derived with the hash primitive (an
/// all-zero digest is rewritten to all-ones, keeping zero reserved for free slots). Two candidate
/// buckets address it:
///
/// ```text
/// i1 = h(element) & (n_buckets - 1)
/// i2 = i1 ^ (h(fingerprint) & (n_buckets - 1))
/// ```
///
/// where `h` reads 4 digest bytes as a big-endian integer. The fingerprint and the bucket
/// indices come from separate derivation domains of the hash primitive, so the two are
/// independent of each other. XORing with the fingerprint hash switches between the two
/// candidates, so either one is recoverable from the other plus the stored fingerprint alone.
///
/// Insertion writes the fingerprint into the first free slot of either candidate bucket. If both
/// are full, a randomly chosen victim fingerprint is evicted to its own alternate bucket to make
/// room, cascading for up to `max_kicks` displacements before the filter reports itself full.
/// There is no rollback: a failed insertion leaves the last evicted fingerprint unplaced.
///
/// Lookup probes the two candidate buckets for the fingerprint. Deletion clears the first
/// matching slot; deleting a value that was never inserted may clear a colliding fingerprint that
/// belongs to another value. This is an intrinsic property of cuckoo filters.
///
/// # See Also
/// - `std::collections::HashSet`: has a false positive rate of 0%, but also needs to store all
///   elements
///
/// # References
/// - ["Cuckoo Filter: Practically Better Than Bloom", Bin Fan, David G. Andersen, Michael
///   Kaminsky, Michael D. Mitzenmacher, 2014](https://www.cs.cmu.edu/~dga/papers/cuckoo-conext2014.pdf).
#[derive(Clone)]
pub struct CuckooFilter<R, H = Xxh3Hasher>
where
    R: Rng,
    H: FingerprintHasher,
{
    buckets: Vec<u8>,
    n_buckets: usize,
    bucketsize: usize,
    fingerprint_len: usize,
    max_kicks: usize,
    n_items: usize,
    hasher: H,
    rng: R,
}

impl<R> CuckooFilter<R>
where
    R: Rng,
{
    /// Create new CuckooFilter with:
    ///
    /// - `rng`: random number generator used for eviction decisions
    /// - `bucketsize`: number of fingerprint slots per bucket, must be at least 1
    /// - `n_buckets`: number of buckets, must be a power of 2
    /// - `fingerprint_len`: fingerprint length in bytes, at most [`MAX_FINGERPRINT_LEN`]
    ///
    /// The kick budget defaults to `n_buckets` and the hash primitive to [`Xxh3Hasher`].
    pub fn with_params(
        rng: R,
        bucketsize: usize,
        n_buckets: usize,
        fingerprint_len: usize,
    ) -> Result<Self, ParamError> {
        Self::with_params_and_hasher(
            rng,
            bucketsize,
            n_buckets,
            fingerprint_len,
            n_buckets,
            Xxh3Hasher,
        )
    }

    /// Construct new CuckooFilter with properties:
    ///
    /// - `false_positive_rate`: false positive lookup rate
    /// - `expected_elements`: number of expected elements to be added to the filter
    /// - `rng`: random number generator used for eviction decisions
    ///
    /// Table parameters come from [`TableParams::for_capacity`] and the hash primitive is
    /// [`Xxh3Hasher`].
    ///
    /// # Panics
    /// If `expected_elements` is zero or `false_positive_rate` is outside `(0, 1)`.
    pub fn with_properties(false_positive_rate: f64, expected_elements: usize, rng: R) -> Self {
        Self::with_properties_and_hasher(false_positive_rate, expected_elements, rng, Xxh3Hasher)
    }

    /// Reconstruct a CuckooFilter from a byte image, e.g. one read back by an external
    /// serializer, using the default [`Xxh3Hasher`].
    ///
    /// The result equals the filter the image was taken from.
    pub fn from_image(image: FilterImage, rng: R) -> Result<Self, ParamError> {
        Self::from_image_and_hasher(image, rng, Xxh3Hasher)
    }
}

impl<R, H> CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
    /// Same as [`with_params`](Self::with_params) but with an explicit kick budget and hash
    /// primitive.
    pub fn with_params_and_hasher(
        rng: R,
        bucketsize: usize,
        n_buckets: usize,
        fingerprint_len: usize,
        max_kicks: usize,
        hasher: H,
    ) -> Result<Self, ParamError> {
        Self::check_slot_params(bucketsize, fingerprint_len, max_kicks)?;
        if !n_buckets.is_power_of_two() {
            return Err(ParamError::NBucketsNotPowerOfTwo { n_buckets });
        }

        let table_len = n_buckets
            .checked_mul(bucketsize)
            .and_then(|slots| slots.checked_mul(fingerprint_len))
            .expect("Table size too large");

        Ok(Self {
            buckets: vec![0; table_len],
            n_buckets,
            bucketsize,
            fingerprint_len,
            max_kicks,
            n_items: 0,
            hasher,
            rng,
        })
    }

    /// Same as [`with_properties`](Self::with_properties) but with a specific hash primitive.
    ///
    /// # Panics
    /// If `expected_elements` is zero or `false_positive_rate` is outside `(0, 1)`.
    pub fn with_properties_and_hasher(
        false_positive_rate: f64,
        expected_elements: usize,
        rng: R,
        hasher: H,
    ) -> Self {
        let params = TableParams::for_capacity(expected_elements, false_positive_rate);
        Self::with_params_and_hasher(
            rng,
            params.bucketsize,
            params.n_buckets,
            params.fingerprint_len,
            params.max_kicks,
            hasher,
        )
        .expect("sizing produces valid parameters")
    }

    /// Same as [`from_image`](Self::from_image) but with a specific hash primitive.
    pub fn from_image_and_hasher(
        image: FilterImage,
        rng: R,
        hasher: H,
    ) -> Result<Self, ParamError> {
        let FilterImage {
            buckets,
            bucketsize,
            fingerprint_len,
            max_kicks,
        } = image;
        Self::check_slot_params(bucketsize, fingerprint_len, max_kicks)?;

        let bucket_bytes = bucketsize
            .checked_mul(fingerprint_len)
            .expect("Table size too large");
        if buckets.len() % bucket_bytes != 0 {
            return Err(ParamError::TableLengthMismatch {
                len: buckets.len(),
                bucket_bytes,
            });
        }
        let n_buckets = buckets.len() / bucket_bytes;
        if !n_buckets.is_power_of_two() {
            return Err(ParamError::NBucketsNotPowerOfTwo { n_buckets });
        }

        let n_items = (0..n_buckets * bucketsize)
            .filter(|slot| !slab::is_zero(&buckets, slot * fingerprint_len, fingerprint_len))
            .count();

        Ok(Self {
            buckets,
            n_buckets,
            bucketsize,
            fingerprint_len,
            max_kicks,
            n_items,
            hasher,
            rng,
        })
    }

    fn check_slot_params(
        bucketsize: usize,
        fingerprint_len: usize,
        max_kicks: usize,
    ) -> Result<(), ParamError> {
        if bucketsize == 0 {
            return Err(ParamError::ParameterZero { name: "bucketsize" });
        }
        if fingerprint_len == 0 {
            return Err(ParamError::ParameterZero {
                name: "fingerprint_len",
            });
        }
        if fingerprint_len > MAX_FINGERPRINT_LEN {
            return Err(ParamError::FingerprintTooLong { fingerprint_len });
        }
        if max_kicks == 0 {
            return Err(ParamError::ParameterZero { name: "max_kicks" });
        }
        Ok(())
    }

    /// Number of buckets used by the CuckooFilter, always a power of two.
    pub fn n_buckets(&self) -> usize {
        self.n_buckets
    }

    /// Number of fingerprint slots per bucket.
    pub fn bucketsize(&self) -> usize {
        self.bucketsize
    }

    /// Length of a single stored fingerprint in bytes.
    pub fn fingerprint_len(&self) -> usize {
        self.fingerprint_len
    }

    /// Displacement budget of a single insertion.
    pub fn max_kicks(&self) -> usize {
        self.max_kicks
    }

    /// The packed bucket table, `n_buckets * bucketsize * fingerprint_len` bytes.
    ///
    /// This is the byte surface an external serializer persists; feed it back through
    /// [`FilterImage`] to reconstruct the filter.
    pub fn bucket_bytes(&self) -> &[u8] {
        &self.buckets
    }

    /// Number of occupied fingerprint slots.
    pub fn len(&self) -> usize {
        self.n_items
    }

    /// Check if the filter is empty, i.e. contains no elements.
    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    /// Clear state of the filter, so that it behaves like a fresh one.
    pub fn clear(&mut self) {
        self.buckets.fill(0);
        self.n_items = 0;
    }

    /// Snapshot the filter into a serializable byte image.
    pub fn image(&self) -> FilterImage {
        FilterImage {
            buckets: self.buckets.clone(),
            bucketsize: self.bucketsize,
            fingerprint_len: self.fingerprint_len,
            max_kicks: self.max_kicks,
        }
    }

    /// Guess if the given element was added to the filter.
    ///
    /// Exactly two bucket probes. A `true` answer may be a false positive caused by another
    /// element sharing the fingerprint and a candidate bucket; a `false` answer is always
    /// correct.
    pub fn contains(&self, item: &[u8]) -> bool {
        let (fp_buf, i1, i2) = self.start(item);
        let fp = &fp_buf[..self.fingerprint_len];

        slab::find_in_bucket(&self.buckets, self.bucket_offset(i1), fp, self.bucketsize).is_some()
            || slab::find_in_bucket(&self.buckets, self.bucket_offset(i2), fp, self.bucketsize)
                .is_some()
    }

    /// Insert new element into the filter, reporting success.
    ///
    /// `false` means the kick budget was exhausted without finding a free slot; the filter is too
    /// full and the caller should stop adding elements. There is no rollback on failure: the
    /// displacement chain leaves the element's fingerprint in the table and drops the last
    /// evicted fingerprint instead.
    ///
    /// Inserting the same element multiple times is supported, up to the `2 * bucketsize` slots
    /// of its candidate buckets.
    pub fn try_insert(&mut self, item: &[u8]) -> bool {
        let (mut fp, i1, i2) = self.start(item);
        let f = self.fingerprint_len;

        let offset = self.bucket_offset(i1);
        if slab::insert_into_bucket(&mut self.buckets, offset, &fp[..f], self.bucketsize) {
            self.n_items += 1;
            return true;
        }
        let offset = self.bucket_offset(i2);
        if slab::insert_into_bucket(&mut self.buckets, offset, &fp[..f], self.bucketsize) {
            self.n_items += 1;
            return true;
        }

        // both candidate buckets full => relocate
        let mut i = if self.rng.gen::<bool>() { i1 } else { i2 };

        for _ in 0..self.max_kicks {
            // swap the carried fingerprint with a random victim, then chase the victim to its
            // alternate bucket
            let slot = self.rng.gen_range(0..self.bucketsize);
            let offset = self.bucket_offset(i) + slot * f;
            for (stored, carried) in self.buckets[offset..offset + f]
                .iter_mut()
                .zip(fp.iter_mut())
            {
                mem::swap(stored, carried);
            }

            i ^= self.index(&fp[..f]);
            let offset = self.bucket_offset(i);
            if slab::insert_into_bucket(&mut self.buckets, offset, &fp[..f], self.bucketsize) {
                self.n_items += 1;
                return true;
            }
        }

        // no space left => fail, the last evicted fingerprint stays unplaced
        false
    }

    /// Insert new element into the filter.
    ///
    /// Same as [`try_insert`](Self::try_insert), with fullness surfaced as an error.
    pub fn insert(&mut self, item: &[u8]) -> Result<(), CuckooFilterFull> {
        if self.try_insert(item) {
            Ok(())
        } else {
            Err(CuckooFilterFull)
        }
    }

    /// Remove element from the filter.
    ///
    /// Clears exactly one matching slot. Returns `true` if a fingerprint of `item` was found and
    /// cleared, `false` if neither candidate bucket holds one, in which case the filter is not
    /// modified.
    ///
    /// Removing a value that was never inserted may clear a colliding fingerprint belonging to
    /// another value. This is an intrinsic property of cuckoo filters.
    pub fn remove(&mut self, item: &[u8]) -> bool {
        let (fp_buf, i1, i2) = self.start(item);
        let fp = &fp_buf[..self.fingerprint_len];

        self.remove_from_bucket(i1, fp) || self.remove_from_bucket(i2, fp)
    }

    fn remove_from_bucket(&mut self, i: usize, fp: &[u8]) -> bool {
        let bucket_offset = self.bucket_offset(i);
        match slab::find_in_bucket(&self.buckets, bucket_offset, fp, self.bucketsize) {
            Some(slot) => {
                let offset = bucket_offset + slot * fp.len();
                self.buckets[offset..offset + fp.len()].fill(0);
                self.n_items -= 1;
                true
            }
            None => false,
        }
    }

    /// Derive the fingerprint and both candidate bucket indices of `item`.
    fn start(&self, item: &[u8]) -> ([u8; MAX_FINGERPRINT_LEN], usize, usize) {
        let fp = self.fingerprint(item);
        let i1 = self.index(item);
        let i2 = i1 ^ self.index(&fp[..self.fingerprint_len]);
        (fp, i1, i2)
    }

    /// Digest `item` into its fingerprint bytes.
    ///
    /// An all-zero digest is rewritten to all-ones, since zero marks a free slot.
    fn fingerprint(&self, item: &[u8]) -> [u8; MAX_FINGERPRINT_LEN] {
        let mut fp = [0u8; MAX_FINGERPRINT_LEN];
        let f = self.fingerprint_len;
        self.hasher.digest(0, item, &mut fp[..f]); // IV
        if slab::is_zero(&fp, 0, f) {
            for b in &mut fp[..f] {
                *b = 0xFF;
            }
        }
        fp
    }

    /// Bucket index of `data`: 4 digest bytes read big-endian, masked to the table width.
    ///
    /// Uses its own derivation domain, so the index digest of a value is independent of the
    /// value's fingerprint digest.
    fn index(&self, data: &[u8]) -> usize {
        let mut buf = [0u8; 4];
        self.hasher.digest(1, data, &mut buf); // IV
        (u32::from_be_bytes(buf) as usize) & (self.n_buckets - 1)
    }

    fn bucket_offset(&self, i: usize) -> usize {
        i * self.bucketsize * self.fingerprint_len
    }
}

impl<R, H> PartialEq for CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
    /// Two filters are equal iff their parameters and bucket bytes agree; RNG and hasher state
    /// are not part of the comparison.
    fn eq(&self, other: &Self) -> bool {
        self.n_buckets == other.n_buckets
            && self.bucketsize == other.bucketsize
            && self.fingerprint_len == other.fingerprint_len
            && self.max_kicks == other.max_kicks
            && self.buckets == other.buckets
    }
}

impl<R, H> Eq for CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
}

impl<R, H> Hash for CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
    fn hash<S>(&self, state: &mut S)
    where
        S: Hasher,
    {
        state.write_usize(self.n_buckets);
        state.write_usize(self.bucketsize);
        state.write_usize(self.fingerprint_len);
        state.write_usize(self.max_kicks);

        // a short digest of the table keeps hashing cheap; always the default primitive so that
        // equal filters hash equal independent of their instance hasher
        let mut digest = [0u8; 4];
        Xxh3Hasher.digest(0, &self.buckets, &mut digest);
        state.write(&digest);
    }
}

impl<R, H> fmt::Debug for CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CuckooFilter {{ bucketsize: {}, n_buckets: {} }}",
            self.bucketsize, self.n_buckets
        )
    }
}

#[cfg(test)]
impl<R, H> CuckooFilter<R, H>
where
    R: Rng,
    H: FingerprintHasher,
{
    /// Occupied slot contents, bucket by bucket, for test assertions.
    fn dump(&self) -> Vec<Vec<Vec<u8>>> {
        (0..self.n_buckets)
            .map(|i| {
                let bucket_offset = self.bucket_offset(i);
                (0..self.bucketsize)
                    .filter_map(|slot| {
                        let offset = bucket_offset + slot * self.fingerprint_len;
                        if slab::is_zero(&self.buckets, offset, self.fingerprint_len) {
                            None
                        } else {
                            Some(self.buckets[offset..offset + self.fingerprint_len].to_vec())
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
