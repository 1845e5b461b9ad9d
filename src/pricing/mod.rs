//! Pricing resolution core.
//!
//! Maps extracted resources to price records through a remote pricing
//! tool. The core owns the retry policy and the session lifecycle; filter
//! generation and the tool transport are injected through
//! [`FilterSynthesizer`] and [`SessionProvider`].

pub mod orchestrator;
pub mod policy;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{PricingBatch, PricingOrchestrator};
pub use policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RESTRICTED_FIELD, ResolutionPolicy};
pub use progress::{CollectingSink, NoopSink, ProgressEvent, ProgressSink};
pub use resolver::{BatchPosition, Resolution, ResolutionLoop, ResolutionState};
pub use session::{PricingSession, Session, SessionProvider};
pub use synthesizer::{Feedback, FilterSynthesizer, SynthesisRequest};
