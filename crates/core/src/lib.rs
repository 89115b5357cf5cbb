//! Host-side domain for the live studio: conversation modes, the tool catalogue the
//! model is offered, and the state those tools build up.

pub mod diagram;
pub mod highlight;
pub mod modes;
pub mod state;
pub mod story;
pub mod tools;

pub use highlight::{Highlight, HighlightLifetime};
pub use modes::Mode;
pub use state::{StudioState, StudioToolHandler};
pub use tools::StudioTool;
