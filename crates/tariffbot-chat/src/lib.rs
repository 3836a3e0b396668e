//! TariffBot chat crate: query routing, the answer generator and its call
//! guard, response composition, and the orchestrator tying them together.

pub mod error;
pub mod generator;
pub mod guard;
pub mod orchestrator;
pub mod response;
pub mod router;
pub mod sources;

pub use error::GeneratorError;
pub use generator::{AnswerGenerator, OpenAiGenerator};
pub use guard::GuardedGenerator;
pub use orchestrator::{read_api_key, Mode, QueryOrchestrator};
pub use router::Route;
pub use sources::{PassageRetriever, TariffLookup};
