//! CFAR Core - Radar Target Detection
//!
//! Constant-false-alarm-rate detection over range-Doppler and range-azimuth
//! power heatmaps. This crate has no I/O and no platform dependencies: it
//! takes a heatmap view and fills caller-owned detection buffers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐ validate ┌──────────────────────────────────────┐
//! │  CfarConfig   │─────────►│            DetectionCfar             │
//! └───────────────┘          │  K0 / K0Table   SnrProfile   Scratch │
//!                            │             Strategy                 │
//!                            └──────────────────┬───────────────────┘
//!                                               │ run
//!           ┌───────────────────┬───────────────┼────────────────────┐
//!           ▼                   ▼               ▼                    ▼
//!   OrderedStatistic     CellAveraging    RangeAzimuth v1     RangeAzimuth v2
//!           └───────────────────┴───────┬───────┴────────────────────┘
//!                                       ▼
//!                              DetectionOutput slices
//! ```
//!
//! # Modules
//!
//! - [`config`]: configuration record, CFAR types, validation
//! - [`detector`]: the detector handle and its lifecycle
//! - [`strategy`]: the CFAR search variants
//! - [`threshold`]: dynamic threshold shaping and the K0 lookup table
//! - [`input`] / [`output`]: per-run views on caller data
//!
//! # Features
//!
//! - `k0-table` (default): [`DetectionCfar::create_with_table`] resolves a
//!   zero K0 from a [`K0Table`].

pub mod config;
pub mod detector;
pub mod error;
pub mod input;
pub mod output;
pub mod scratch;
pub mod strategy;
pub mod threshold;

pub use config::{CaCfarKind, CfarConfig, CfarType, InputType, MAX_FFT_SIZE, OS_SEARCH_WINDOW};
pub use detector::{DetectionCfar, DetectorState};
pub use error::{CfarError, CfarResult};
pub use input::{DetectionInput, SearchFlags};
pub use output::{BinIndex, CrossAxis, Detection, DetectionBuffers, DetectionOutput};
pub use strategy::{CfarStrategy, Strategy};
pub use threshold::{K0Table, SnrProfile};
