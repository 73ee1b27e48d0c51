//! facesort-core — Sort images into album directories by the faces they contain.
//!
//! Discovers source images and albums, keeps a content-addressed cache of
//! per-image face feature vectors, stores per-album training samples, and
//! reconciles album directory contents against the match decisions.
//! Face extraction and comparison are injected through [`FeatureExtractor`]
//! and [`FeatureComparator`].

pub mod cache;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod encoding;
pub mod error;
pub mod fsutil;
pub mod image;
pub mod matcher;
pub mod reconcile;
pub mod types;

pub use cache::{EncodingCache, RefreshStats};
pub use classify::{Album, Discovery};
pub use config::{Layout, RunOptions};
pub use corpus::{TrainingCorpus, TrainingSample};
pub use error::{Error, Result};
pub use image::{ContentHash, Image};
pub use matcher::MatchEngine;
pub use reconcile::{clear_cache, Placement, Reconciler, RunReport};
pub use types::{ExtractError, FeatureComparator, FeatureExtractor, FeatureVector};
