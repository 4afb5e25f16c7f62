//! Label records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{LabelId, ProjectId};

/// Label row. Read-only for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Label {
    pub id: LabelId,
    pub project_id: ProjectId,
    pub name: String,
}
