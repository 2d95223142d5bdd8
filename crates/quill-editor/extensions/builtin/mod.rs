//! Extensions every manager includes unless the caller supplies its own

pub mod commands;
pub mod helpers;
pub mod keymap;

pub use commands::CommandsExtension;
pub use helpers::HelpersExtension;
pub use keymap::KeymapExtension;

use super::Extension;
use crate::core::BuiltinOptions;

/// The builtin extensions configured from the manager settings
pub fn builtin_preset(options: &BuiltinOptions) -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(CommandsExtension::new()),
        Box::new(HelpersExtension::new()),
        Box::new(KeymapExtension::from_builtin(options)),
    ]
}
