//! Network quality test of [Medea] media sessions.
//!
//! [`QualityTest`] publishes a test stream into a [`MediaSession`],
//! subscribes to it, periodically samples outbound transport statistics and
//! estimates audio and video quality as [MOS] over the steady-state tail of
//! the run. If audio quality is insufficient, an audio-only run follows.
//!
//! [Medea]: https://github.com/instrumentisto/medea
//! [MOS]: https://en.wikipedia.org/wiki/Mean_opinion_score

#![allow(clippy::module_name_repetitions)]

pub mod callback;
pub mod conf;
pub mod errors;
pub mod log;
pub mod metrics;
pub mod orchestrator;
pub mod quality;
pub mod run_loop;
pub mod session;
pub mod stats;

#[doc(inline)]
pub use self::{
    callback::{Phase, UpdateCallbackStats},
    conf::Conf,
    errors::QualityTestError,
    orchestrator::{QualityTest, QualityTestOptions, StopHandle},
    quality::{QualityReport, QualityScore, UnsupportedReason},
    session::{MediaSession, Publisher, SessionError, Subscriber},
};
