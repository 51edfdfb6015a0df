// src/reference/strict_check.rs
//! Double-release detection policy

use crate::utils::config::HostConfig;
use serde::{Deserialize, Serialize};

/// When reference collections treat a double release as a hard error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStrictCheckType {
    AlwaysEnable,
    #[default]
    OnlyEnableWhenDevelopment,
    OnlyEnableInEditor,
    AlwaysDisable,
}

impl ReferenceStrictCheckType {
    /// Resolve the policy against the host profile
    pub fn is_enabled(self, host: &HostConfig) -> bool {
        match self {
            ReferenceStrictCheckType::AlwaysEnable => true,
            ReferenceStrictCheckType::OnlyEnableWhenDevelopment => host.development,
            ReferenceStrictCheckType::OnlyEnableInEditor => host.editor,
            ReferenceStrictCheckType::AlwaysDisable => false,
        }
    }
}
