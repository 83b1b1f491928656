//! Configuration loading and management.

mod env;
mod hardware;
mod lexicon;
mod types;

pub use env::{KnobSource, ProcessEnv, parse_size};
pub use hardware::probe as probe_hardware;
pub use lexicon::{Lexicon, LexiconSet};
pub use types::{
    AspectRatio, ClipConfig, Config, DurationClass, HardwareProfile, HookPosition, JobOptions,
    Precision, RenderConfig, Style, ToolPaths, TranscriberConfig, VisualConfig,
};
