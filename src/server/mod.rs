//! REST API server - the presentation shell's view of the tour.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐        channel             ┌──────────────────────┐
//! │   API Server Thread     │  ───── ApiCommand ──────▶  │   Host loop          │
//! │   (rouille HTTP)        │                            │   (tick interval)    │
//! │                         │                            │                      │
//! │  POST /api/poi/2        │  ──▶ SelectPoi(2) ─────▶   │  tour.handle(..)     │
//! │  POST /api/finished     │  ──▶ PlaybackFinished ─▶   │  tour.handle(..)     │
//! └─────────────────────────┘                            └──────────────────────┘
//!          │                                                      │
//!          │  Arc<SharedTourState>                                │
//!          │◀──────────── read snapshots ─────────────────────────│
//!          │                                             updated every tick
//! ```
//!
//! A renderer polls `/api/status` (watch `revision` for session changes),
//! plays whatever `session.url` names, and posts `/api/finished` when a clip
//! ends.
//!
//! # Endpoints
//!
//! | Method | Path             | Description                         |
//! |--------|------------------|-------------------------------------|
//! | GET    | `/api/status`    | Phase, progress, session            |
//! | GET    | `/api/catalog`   | POI metadata                        |
//! | GET    | `/api/preload`   | Load records with outcomes          |
//! | GET    | `/api/health`    | Health check                        |
//! | POST   | `/api/poi/{id}`  | Select point of interest            |
//! | POST   | `/api/return`    | Return from the resting view        |
//! | POST   | `/api/demo`      | Run the demo sequence               |
//! | POST   | `/api/close`     | Close the description               |
//! | POST   | `/api/finished`  | Current clip finished playing       |
//! | POST   | `/api/reload`    | Retry after a failed loading phase  |

mod api;

pub use api::{ApiCommand, ApiServer, SharedTourState, StatusSnapshot};
