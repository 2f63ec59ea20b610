//! Binary-crate test suite: end-to-end face scenarios driven through the
//! library's public API.
