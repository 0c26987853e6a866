//! Semantic checks for in-memory authoritative DNS zones.
//!
//! The entry point is [`semcheck::check_zone`], which walks a [`zone::Zone`]
//! and reports findings through a [`semcheck::SemHandler`].

#![warn(
    clippy::semicolon_if_nothing_returned,
    missing_copy_implementations,
    missing_debug_implementations,
    noop_method_call,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    variant_size_differences
)]

pub mod name;
pub mod rdata;
pub mod rrtype;
pub mod semcheck;
pub mod zone;

pub use crate::name::Name;
pub use crate::rdata::Rdata;
pub use crate::rrtype::RrType;
pub use crate::semcheck::{check_zone, CheckError, CheckOption, SemError, SemHandler};
pub use crate::zone::{Zone, ZoneBuilder};
