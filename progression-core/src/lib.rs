//! Progression resolution engine for a tabletop character-build configurator.
//!
//! This crate provides:
//! - Subclass grafting onto class leveling tables
//! - A pure resolver turning a build into features, pending choices and spell slots
//! - Pick-step derivation from quota rows and known-count tables
//! - Content loading with a reloadable session cache
//!
//! # Quick Start
//!
//! ```ignore
//! use progression_core::{resolve_progression, ContentBundle, ResolveInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bundle = ContentBundle::load_json("content.json").await?;
//!
//!     let input = ResolveInput::new().with_subclassed("wizard", 3, "evocation");
//!     let output = resolve_progression(&input, &bundle);
//!
//!     for choice in &output.pending_choices {
//!         println!("{}: {} remaining", choice.prompt, choice.remaining);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod choices;
pub mod config;
pub mod content;
pub mod graft;
pub mod naming;
pub mod picks;
pub mod progression;
pub mod requirements;
pub mod resolver;
pub mod selection;
pub mod testing;

// Primary public API
pub use cache::ContentCache;
pub use choices::{ChoiceIndex, OwnerType, QuotaRow};
pub use config::EngineConfig;
pub use content::{ContentBundle, LoadError};
pub use graft::with_subclass;
pub use picks::{PickKind, PickStepDeriver, Step};
pub use progression::{ClassProgression, Grant, Spellcasting, SubclassDefinition};
pub use requirements::{PickRequirement, RequirementTable};
pub use resolver::{resolve_progression, ResolveInput, ResolveOutput};
pub use selection::{Selection, Selections};
