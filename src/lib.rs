//! A cuckoo filter: a set-like data structure that keeps track of elements it has seen without
//! the need to store them. Lookups have a tunable false positive rate and a false negative rate
//! of 0%. Unlike a Bloom filter, elements can also be deleted again.
//!
//! The filter stores short fingerprints in a packed byte table and is meant to be embedded as an
//! in-process object owned by a single component. Persistence is a byte image
//! ([`filter::FilterImage`]) handled by an external serializer.

#![deny(anonymous_parameters)]
#![deny(bare_trait_objects)]
#![deny(dead_code)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(unknown_lints)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unreachable_pub)]
#![deny(unsafe_code)]
#![deny(unused_extern_crates)]

pub use rand;

pub mod filter;
pub mod hasher;
pub mod params;
mod slab;

#[cfg(test)]
mod test_util;
