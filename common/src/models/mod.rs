//! Shared data models.

pub mod spatial;

pub use spatial::{BoundingBox, CountResponse, Feature, FeatureCollection, TableDescriptor, TablesResponse};
