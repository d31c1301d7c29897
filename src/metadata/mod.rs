//! Metadata blob parsing and access.
//!
//! This module owns everything that touches the raw metadata blob: the validated
//! header and table directory, typed row decoding, heap access, usage token
//! encoding, and the builder that produces blobs for tools and tests.
//!
//! # Architecture
//!
//! [`reader::MetadataImage`] is the single entry point for consumers. It validates
//! the header once ([`header::ImageHeader`]), then serves bounds-checked typed rows
//! ([`tables`]) and heap strings. Encoded usage tokens ([`token::UsageToken`]) are
//! plain values here; resolving them against a live runtime happens in [`usage`].

pub mod builder;
pub mod header;
pub mod io;
pub mod reader;
pub mod tables;
pub mod token;
pub mod usage;
