//! Cryptographic primitives: the VRF and the stake-weighted threshold math.

pub mod threshold;
pub mod vrf;
