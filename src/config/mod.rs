//! Layered configuration.
//!
//! Tiers, lowest priority first, merged field by field:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/taskzen/config.yaml`
//! 3. **User** - `~/.taskzen/config.yaml`
//! 4. **Environment** - variables below
//!
//! `prompts.yaml` follows the same project/user tiers.
//!
//! ## Environment Variables
//! - `TASKZEN_CONFIG_PATH` - single config file replacing the file tiers
//! - `TASKZEN_PROJECT_DIR` - project config dir (default: `./taskzen`)
//! - `TASKZEN_USER_DIR` - user config dir (default: `~/.taskzen`)
//! - `TASKZEN_PROVIDER` - `openai` or `disabled`
//! - `TASKZEN_BASE_URL` - chat-completions base URL
//! - `TASKZEN_MODEL` - model name

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
