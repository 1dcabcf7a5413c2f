use serde::{Deserialize, Serialize};

use crate::file::FileId;
use crate::plan::TransformPlan;
use crate::wire::WireError;

/// Wire representation of transplan.plan.v1.
///
/// Collections are optional here so a missing one can be reported by name
/// instead of as a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<Vec<String>>,
}

impl TryFrom<PlanV1> for TransformPlan {
    type Error = WireError;

    fn try_from(wire: PlanV1) -> Result<Self, Self::Error> {
        let transform = required(wire.transform, "transform")?;
        let append = required(wire.append, "append")?;
        let remove = required(wire.remove, "remove")?;

        TransformPlan::new(
            transform.into_iter().map(FileId::from).collect(),
            append.into_iter().map(FileId::from).collect(),
            remove,
        )
        .map_err(WireError::Shape)
    }
}

impl From<&TransformPlan> for PlanV1 {
    fn from(plan: &TransformPlan) -> Self {
        PlanV1 {
            schema: Some(crate::schema::TRANSPLAN_PLAN_V1.to_string()),
            transform: Some(plan.transform().iter().map(|f| f.to_string()).collect()),
            append: Some(plan.append().iter().map(|f| f.to_string()).collect()),
            remove: Some(plan.remove().to_vec()),
        }
    }
}

fn required(items: Option<Vec<String>>, name: &'static str) -> Result<Vec<String>, WireError> {
    let items = items.ok_or(WireError::MissingCollection { name })?;
    if let Some(index) = items.iter().position(|s| s.trim().is_empty()) {
        return Err(WireError::EmptyEntry {
            collection: name,
            index,
        });
    }
    Ok(items)
}
