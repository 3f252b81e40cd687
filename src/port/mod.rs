//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! The execution engine reaches every external system through these traits:
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!     ┌──────────────┤  aligner · preparer ·   ├──────────────┐
//!     │              │  invoker · executor     │              │
//!     │              └─────────────────────────┘              │
//!     ▼                                                       ▼
//! ┌──────────────┐                                    ┌──────────────┐
//! │ SourceStream │                                    │ Experiment   │
//! │ SourceCatalog│                                    │ Store        │
//! └──────────────┘                                    └──────────────┘
//! ```

pub mod outbound;
